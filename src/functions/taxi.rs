use super::booking::BookingRejection;
use super::normalize::{clean_name, clean_time, is_clock_time};
use super::venue::{VenueMatch, VenueStore};
use crate::error::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

const TAXI_COLORS: [&str; 6] = ["black", "white", "red", "yellow", "blue", "grey"];
const TAXI_BRANDS: [&str; 10] = [
    "toyota",
    "skoda",
    "bmw",
    "honda",
    "ford",
    "audi",
    "lexus",
    "volvo",
    "volkswagen",
    "tesla",
];
const PLACE_DOMAINS: [&str; 3] = ["restaurant", "hotel", "attraction"];

/// A taxi assigned to a successful booking. Nothing about it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxiDescriptor {
    pub color: String,
    pub brand: String,
    pub phone: String,
}

impl TaxiDescriptor {
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        let color = TAXI_COLORS.choose(&mut rng).copied().unwrap_or("black");
        let brand = TAXI_BRANDS.choose(&mut rng).copied().unwrap_or("toyota");
        let phone: String = (0..10)
            .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
            .collect();
        Self {
            color: color.to_string(),
            brand: brand.to_string(),
            phone,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Booking succeed. There is a {} {} taxi. Contact number is {}.",
            self.color, self.brand, self.phone
        )
    }
}

fn is_unset(value: Option<&String>) -> bool {
    value.map_or(true, |v| v.trim().is_empty() || v.trim() == "[value]")
}

/// Resolve a place against the restaurant, hotel and attraction catalogues
pub fn resolve_place(venues: &VenueStore, place: &str) -> Result<Option<VenueMatch>> {
    let raw = place.trim().to_lowercase();
    let cleaned = clean_name(&raw);
    for domain in PLACE_DOMAINS {
        if let Some(venue) = venues.find_by_name_or_address(domain, &cleaned, &raw)? {
            return Ok(Some(venue));
        }
        if cleaned != raw {
            if let Some(venue) = venues.find_by_name_or_address(domain, &raw, &raw)? {
                return Ok(Some(venue));
            }
        }
    }
    Ok(None)
}

/// Check a taxi request and pick a taxi for it
pub fn book_taxi(
    info: &BTreeMap<String, String>,
    venues: &VenueStore,
) -> Result<std::result::Result<TaxiDescriptor, BookingRejection>> {
    let place_slots = ["departure", "destination"];

    let missing: Vec<String> = place_slots
        .iter()
        .filter(|slot| is_unset(info.get(**slot)))
        .map(|slot| slot.to_string())
        .collect();
    if !missing.is_empty() {
        return Ok(Err(BookingRejection::MissingPlaces { slots: missing }));
    }

    let mut resolved = Vec::with_capacity(place_slots.len());
    let mut unknown = Vec::new();
    for slot in place_slots {
        match resolve_place(venues, &info[slot])? {
            Some(venue) => resolved.push(venue),
            None => unknown.push(slot.to_string()),
        }
    }
    if !unknown.is_empty() {
        return Ok(Err(BookingRejection::UnknownPlaces { slots: unknown }));
    }
    if resolved[0].name == resolved[1].name {
        return Ok(Err(BookingRejection::SamePlace));
    }

    let present: Vec<(&str, &String)> = [("leave", "leave_time"), ("arrive", "arrive_time")]
        .into_iter()
        .filter_map(|(label, slot)| {
            info.get(slot)
                .filter(|value| !is_unset(Some(*value)))
                .map(|value| (label, value))
        })
        .collect();
    if present.is_empty() {
        return Ok(Err(BookingRejection::MissingTravelTime));
    }

    let malformed: Vec<String> = present
        .iter()
        .filter(|(_, value)| !is_clock_time(&clean_time(value)))
        .map(|(label, _)| label.to_string())
        .collect();
    if !malformed.is_empty() {
        return Ok(Err(BookingRejection::InvalidTravelTime { slots: malformed }));
    }

    Ok(Ok(TaxiDescriptor::random()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::booking::RejectionKind;
    use crate::functions::venue::tests::sample_store;

    fn info(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_descriptor_shape() {
        let taxi = TaxiDescriptor::random();
        assert!(TAXI_COLORS.contains(&taxi.color.as_str()));
        assert!(TAXI_BRANDS.contains(&taxi.brand.as_str()));
        assert_eq!(taxi.phone.len(), 10);
        assert!(taxi.phone.chars().all(|c| c.is_ascii_digit()));
        assert!(taxi.message().starts_with("Booking succeed. There is a "));
    }

    #[test]
    fn test_resolve_by_name_address_and_article() {
        let venues = sample_store();
        assert_eq!(
            resolve_place(&venues, "Pizza Hut").unwrap().unwrap().domain,
            "restaurant"
        );
        assert_eq!(
            resolve_place(&venues, "The Acorn Guest House")
                .unwrap()
                .unwrap()
                .name,
            "acorn guest house"
        );
        assert_eq!(
            resolve_place(&venues, "the fitzwilliam museum")
                .unwrap()
                .unwrap()
                .domain,
            "attraction"
        );
        assert_eq!(
            resolve_place(&venues, "Trumpington Street")
                .unwrap()
                .unwrap()
                .name,
            "the fitzwilliam museum"
        );
        assert!(resolve_place(&venues, "the moon").unwrap().is_none());
    }

    #[test]
    fn test_successful_taxi() {
        let venues = sample_store();
        let taxi = book_taxi(
            &info(&[
                ("departure", "pizza hut"),
                ("destination", "kings college"),
                ("leave_time", "5pm"),
            ]),
            &venues,
        )
        .unwrap();
        assert!(taxi.is_ok());
    }

    #[test]
    fn test_taxi_rejections() {
        let venues = sample_store();

        let rejection = book_taxi(&info(&[("departure", "pizza hut")]), &venues)
            .unwrap()
            .unwrap_err();
        assert_eq!(
            rejection.to_string(),
            "Booking failed. The destination is missing."
        );

        let rejection = book_taxi(
            &info(&[("departure", "pizza hut"), ("destination", "the moon")]),
            &venues,
        )
        .unwrap()
        .unwrap_err();
        assert_eq!(rejection.kind(), RejectionKind::Existence);

        let rejection = book_taxi(
            &info(&[
                ("departure", "pizza hut"),
                ("destination", "Pizza Hut"),
                ("leave_time", "10:00"),
            ]),
            &venues,
        )
        .unwrap()
        .unwrap_err();
        assert_eq!(rejection, BookingRejection::SamePlace);
        assert_eq!(rejection.kind(), RejectionKind::Relation);

        let rejection = book_taxi(
            &info(&[("departure", "pizza hut"), ("destination", "kings college")]),
            &venues,
        )
        .unwrap()
        .unwrap_err();
        assert_eq!(rejection, BookingRejection::MissingTravelTime);

        let rejection = book_taxi(
            &info(&[
                ("departure", "pizza hut"),
                ("destination", "kings college"),
                ("leave_time", "soon"),
                ("arrive_time", "lunch"),
            ]),
            &venues,
        )
        .unwrap()
        .unwrap_err();
        assert_eq!(
            rejection.to_string(),
            "Booking failed. Please provide valid time format for the leave and arrive, like \"07:30\"."
        );
    }
}
