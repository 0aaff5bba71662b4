//! Multipart payload assembly for `/reports` and `/events`.

use reqwest::multipart::{Form, Part};
use tracing::debug;

use super::SubmitError;
use crate::calendar::to_iso8601;
use crate::geocode::extract_city;
use crate::wizard::{FormSnapshot, PhotoRef, SubmissionKind};

#[derive(Debug, Clone)]
pub struct PhotoPart {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoPart {
    async fn read(photo: &PhotoRef) -> Result<Self, SubmitError> {
        let bytes = tokio::fs::read(&photo.path)
            .await
            .map_err(|err| SubmitError::Photo {
                path: photo.path.display().to_string(),
                message: err.to_string(),
            })?;

        let file_name = photo
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());

        let mime_type = photo.mime_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&photo.path)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        Ok(Self {
            file_name,
            mime_type,
            bytes,
        })
    }
}

/// Text fields in wire order plus the photo binaries.
#[derive(Debug, Clone)]
pub struct SubmissionPayload {
    pub kind: SubmissionKind,
    pub fields: Vec<(&'static str, String)>,
    pub photos: Vec<PhotoPart>,
}

impl SubmissionPayload {
    /// Build the payload from a validated snapshot.
    ///
    /// `address` is the text to submit for the selected location; the
    /// snapshot's display label is never used for it.
    pub async fn assemble(
        snapshot: &FormSnapshot,
        user_id: &str,
        address: Option<&str>,
    ) -> Result<Self, SubmitError> {
        let coordinate = snapshot
            .location
            .coordinate
            .ok_or(SubmitError::Validation(crate::wizard::RequiredField::Coordinate))?;
        let address = address.unwrap_or_default();
        let latitude = coordinate.latitude.to_string();
        let longitude = coordinate.longitude.to_string();

        let fields = match snapshot.kind {
            SubmissionKind::Report => vec![
                ("title", snapshot.title.trim().to_string()),
                ("description", snapshot.description.trim().to_string()),
                ("city", extract_city(address).unwrap_or_default()),
                ("latitude", latitude),
                ("longitude", longitude),
                ("type", snapshot.category.clone().unwrap_or_default()),
                ("userId", user_id.to_string()),
            ],
            SubmissionKind::Event => {
                let date = snapshot
                    .event_date
                    .as_ref()
                    .map(to_iso8601)
                    .ok_or(SubmitError::Validation(
                        crate::wizard::RequiredField::EventDate,
                    ))?;
                vec![
                    ("title", snapshot.title.trim().to_string()),
                    ("description", snapshot.description.trim().to_string()),
                    ("date", date),
                    ("latitude", latitude),
                    ("longitude", longitude),
                    ("location", address.to_string()),
                    ("organizerId", user_id.to_string()),
                ]
            }
        };

        let mut photos = Vec::with_capacity(snapshot.photos.len());
        for photo in &snapshot.photos {
            photos.push(PhotoPart::read(photo).await?);
        }

        debug!(
            kind = snapshot.kind.as_str(),
            photos = photos.len(),
            "payload assembled"
        );
        Ok(Self {
            kind: snapshot.kind,
            fields,
            photos,
        })
    }

    pub fn endpoint(&self) -> &'static str {
        match self.kind {
            SubmissionKind::Report => "/reports",
            SubmissionKind::Event => "/events",
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn into_form(self) -> Result<Form, SubmitError> {
        let mut form = Form::new();
        for (name, value) in self.fields {
            form = form.text(name, value);
        }
        for photo in self.photos {
            let part = Part::bytes(photo.bytes)
                .file_name(photo.file_name.clone())
                .mime_str(&photo.mime_type)
                .map_err(|err| SubmitError::Photo {
                    path: photo.file_name,
                    message: err.to_string(),
                })?;
            form = form.part("photos", part);
        }
        Ok(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocode::Coordinate;
    use crate::location::{LocationSelection, PayloadAddress};
    use chrono::{TimeZone, Utc};

    fn snapshot(kind: SubmissionKind) -> FormSnapshot {
        let mut snapshot = FormSnapshot::new(kind);
        snapshot.title = " Lampadaire cassé ".to_string();
        snapshot.description = "Ne s'allume plus".to_string();
        snapshot.category = Some("eclairage".to_string());
        snapshot.location = LocationSelection {
            display_text: "Ma position".to_string(),
            coordinate: Coordinate::new(48.8687, 2.3318),
            is_current_location_label: true,
            payload_address: PayloadAddress::Unset,
        };
        snapshot
    }

    #[tokio::test]
    async fn report_fields_use_submitted_address_for_city() {
        let payload = SubmissionPayload::assemble(
            &snapshot(SubmissionKind::Report),
            "u-1",
            Some("10 Rue de la Paix, 75002 Paris, France"),
        )
        .await
        .unwrap();

        let names: Vec<_> = payload.fields.iter().map(|(k, _)| *k).collect();
        assert_eq!(
            names,
            ["title", "description", "city", "latitude", "longitude", "type", "userId"]
        );
        assert_eq!(payload.field("title"), Some("Lampadaire cassé"));
        assert_eq!(payload.field("city"), Some("Paris"));
        assert_eq!(payload.field("latitude"), Some("48.8687"));
        assert_eq!(payload.field("type"), Some("eclairage"));
        assert_eq!(payload.field("userId"), Some("u-1"));
        assert_eq!(payload.endpoint(), "/reports");
    }

    #[tokio::test]
    async fn event_fields_carry_iso_date_and_location() {
        let mut snap = snapshot(SubmissionKind::Event);
        snap.event_date = Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());

        let payload = SubmissionPayload::assemble(&snap, "org-9", Some("Place Bellecour, 69002 Lyon"))
            .await
            .unwrap();

        assert_eq!(payload.endpoint(), "/events");
        assert_eq!(payload.field("date"), Some("2024-05-01T10:00:00.000Z"));
        assert_eq!(payload.field("location"), Some("Place Bellecour, 69002 Lyon"));
        assert_eq!(payload.field("organizerId"), Some("org-9"));
        assert_eq!(payload.field("userId"), None);
    }

    #[tokio::test]
    async fn photos_are_read_with_guessed_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trou.png");
        std::fs::write(&path, b"\x89PNG").unwrap();
        let mut snap = snapshot(SubmissionKind::Report);
        snap.photos.push(PhotoRef::new(&path));

        let payload = SubmissionPayload::assemble(&snap, "u-1", None).await.unwrap();

        assert_eq!(payload.photos.len(), 1);
        assert_eq!(payload.photos[0].file_name, "trou.png");
        assert_eq!(payload.photos[0].mime_type, "image/png");
        assert_eq!(payload.photos[0].bytes, b"\x89PNG");
        assert_eq!(payload.field("city"), Some(""));
    }

    #[tokio::test]
    async fn unreadable_photo_is_reported_with_its_path() {
        let mut snap = snapshot(SubmissionKind::Report);
        snap.photos.push(PhotoRef::new("/nonexistent/photo.jpg"));

        let err = SubmissionPayload::assemble(&snap, "u-1", None)
            .await
            .unwrap_err();

        match err {
            SubmitError::Photo { path, .. } => assert_eq!(path, "/nonexistent/photo.jpg"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
