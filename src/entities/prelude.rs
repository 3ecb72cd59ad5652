pub use super::price_points::Entity as PricePoints;
