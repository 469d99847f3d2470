use serde::{Deserialize, Serialize};

pub const UNKNOWN_VEHICLE: &str = "Unknown Vehicle";
pub const UNKNOWN_BRAND: &str = "Unknown Brand";
pub const UNKNOWN_CATEGORY: &str = "Unknown Category";

/// One `<item>` of the game's sale-state file, as read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleItem {
    /// Reference to the vehicle definition record (`xmlFilename`).
    pub reference: String,
    pub price: f64,
    pub age: u32,
    pub damage: f64,
    pub wear: f64,
    pub operating_time_minutes: f64,
    pub time_left: i64,
}

/// Static attributes pulled out of a vehicle definition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleDetails {
    pub name: String,
    pub brand: String,
    pub category: String,
    pub specs: String,
    /// Raw image reference as written in the record, if any.
    pub image_ref: Option<String>,
}

/// A fully resolved sale entry: sale-state values plus vehicle details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub price: f64,
    pub age: u32,
    pub damage: f64,
    pub wear: f64,
    pub operating_time_minutes: f64,
    pub time_left: i64,
    pub brand: String,
    pub category: String,
    pub specs: String,
    /// Converted, directly displayable image on disk.
    pub image: Option<String>,
    pub reference: String,
}

impl Listing {
    /// Combine a sale row with resolved details.
    pub fn from_parts(item: &SaleItem, details: VehicleDetails, image: Option<String>) -> Self {
        Self {
            name: details.name,
            price: item.price,
            age: item.age,
            damage: item.damage,
            wear: item.wear,
            operating_time_minutes: item.operating_time_minutes,
            time_left: item.time_left,
            brand: details.brand,
            category: details.category,
            specs: details.specs,
            image,
            reference: item.reference.clone(),
        }
    }

    /// Listing used when the definition record cannot be resolved.
    pub fn placeholder(item: &SaleItem) -> Self {
        let details = VehicleDetails {
            name: UNKNOWN_VEHICLE.to_string(),
            brand: UNKNOWN_BRAND.to_string(),
            category: UNKNOWN_CATEGORY.to_string(),
            specs: String::new(),
            image_ref: None,
        };
        Self::from_parts(item, details, None)
    }

    pub fn operating_hours(&self) -> f64 {
        (self.operating_time_minutes / 60.0 * 10.0).round() / 10.0
    }

    /// Base file name of the image, used to build public URLs.
    pub fn image_file_name(&self) -> Option<&str> {
        let image = self.image.as_deref()?;
        std::path::Path::new(image)
            .file_name()
            .and_then(|n| n.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> SaleItem {
        SaleItem {
            reference: "data/vehicles/x.xml".into(),
            price: 1000.0,
            age: 2,
            damage: 0.1,
            wear: 0.2,
            operating_time_minutes: 125.0,
            time_left: 5,
        }
    }

    #[test]
    fn placeholder_uses_unknown_values() {
        let l = Listing::placeholder(&item());
        assert_eq!(l.name, UNKNOWN_VEHICLE);
        assert_eq!(l.brand, UNKNOWN_BRAND);
        assert_eq!(l.category, UNKNOWN_CATEGORY);
        assert_eq!(l.specs, "");
        assert!(l.image.is_none());
        assert_eq!(l.time_left, 5);
    }

    #[test]
    fn operating_hours_rounds_to_one_decimal() {
        let l = Listing::placeholder(&item());
        assert_eq!(l.operating_hours(), 2.1);
    }

    #[test]
    fn image_file_name_is_base_name() {
        let mut l = Listing::placeholder(&item());
        l.image = Some("/srv/images/store_tractor.png".into());
        assert_eq!(l.image_file_name(), Some("store_tractor.png"));
    }
}
