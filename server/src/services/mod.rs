pub mod pick_cache_evictor;
pub mod portfolio_poller;
pub mod snapshot_retention;
