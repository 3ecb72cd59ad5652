pub mod price_sample_sync;
