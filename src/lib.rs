// src/lib.rs

use services::historical_data::HistoricalDataService;

#[derive(Clone)]
pub struct AppState {
    pub historical: HistoricalDataService,
}

pub mod entities {
    pub mod prelude;
    pub mod price_points;
}

pub mod services {
    pub mod coinmarketcap;
    pub mod historical_data;
}

pub mod models;
pub mod handlers;
pub mod jobs;
