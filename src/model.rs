//! Data structures describing a driver registration and its photos.
//!
//! Records are produced by the registration flow and are read-only from the
//! report's point of view.  The types carry serde derives so that seed files
//! and JSON payloads map onto them directly; every text field defaults to an
//! empty string because the report renders missing values as blanks.

use serde::{Deserialize, Serialize};

/// Reference to a photo attached to a registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoRef {
    url: String,
    name: String,
}

impl PhotoRef {
    /// Creates a photo reference from its URL (or local path) and display name.
    pub fn new(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
        }
    }

    /// Returns the reference URL as stored with the registration.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the display name of the photo.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A driver registration entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    id: i64,
    name: String,
    carrier: String,
    plate: String,
    destination: String,
    registered_on: String,
    photos: Vec<PhotoRef>,
}

impl Record {
    /// Creates an empty record with the given identifier.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    /// Driver name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Carrier (transport company) name.
    pub fn carrier(&self) -> &str {
        &self.carrier
    }

    pub fn plate(&self) -> &str {
        &self.plate
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Registration date exactly as captured by the registration flow.
    pub fn registered_on(&self) -> &str {
        &self.registered_on
    }

    /// Photo references in registration order.
    pub fn photos(&self) -> &[PhotoRef] {
        &self.photos
    }

    /// Returns the five report fields in their fixed order, paired with labels.
    pub fn labeled_fields(&self) -> [(&'static str, &str); 5] {
        [
            ("Driver Name:", self.name.as_str()),
            ("Carrier:", self.carrier.as_str()),
            ("Plate:", self.plate.as_str()),
            ("Destination:", self.destination.as_str()),
            ("Registration Date:", self.registered_on.as_str()),
        ]
    }

    /// Sets the identifier and returns the updated record.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }

    /// Sets the driver name and returns the updated record.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the carrier and returns the updated record.
    pub fn with_carrier(mut self, carrier: impl Into<String>) -> Self {
        self.carrier = carrier.into();
        self
    }

    /// Sets the plate and returns the updated record.
    pub fn with_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = plate.into();
        self
    }

    /// Sets the destination and returns the updated record.
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Sets the registration date and returns the updated record.
    pub fn with_registered_on(mut self, registered_on: impl Into<String>) -> Self {
        self.registered_on = registered_on.into();
        self
    }

    /// Appends a photo reference and returns the updated record.
    pub fn with_photo(mut self, photo: PhotoRef) -> Self {
        self.photos.push(photo);
        self
    }

    /// Extends the record with multiple photo references.
    pub fn with_photos<I>(mut self, photos: I) -> Self
    where
        I: IntoIterator<Item = PhotoRef>,
    {
        self.photos.extend(photos);
        self
    }

    /// Returns a copy of the record without its photo references.
    pub fn without_photos(&self) -> Self {
        Self {
            photos: Vec::new(),
            ..self.clone()
        }
    }
}
