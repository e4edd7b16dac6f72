//! Integration test harness for Driftnet.

mod integration {
    mod fanout;
    mod season_packs;
    mod stream_session;
}
