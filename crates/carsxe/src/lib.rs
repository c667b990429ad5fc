pub mod client;

pub use client::{normalize_image_link, CarsxeClient, CarsxeError, DecodedVehicle};
