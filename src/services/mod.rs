pub mod city_dataset;
pub mod open_meteo;

pub use city_dataset::{City, CityDataset, DatasetError};
pub use open_meteo::{CurrentWeather, ForecastResponse, GeocodedLocation, OpenMeteoClient};
