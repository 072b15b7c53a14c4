//! Composite grouping keys for the OutView allocation.
//!
//! Keys borrow from the records they describe, so building them for a whole
//! batch costs no allocation beyond the hash maps that group them.

use crate::schema::{ElementType, RawOutViewRecord};
use chrono::NaiveDate;
use ordered_float::OrderedFloat;

pub type Coordinate = Option<OrderedFloat<f64>>;

fn coordinate(value: Option<f64>) -> Coordinate {
    value.map(OrderedFloat)
}

/// Extracts the month token (`MAR2023`) from a base name such as `OPW09MAR2023`.
///
/// The token sits at character positions 5..12; shorter names yield whatever
/// falls inside that window.
pub fn month_token(base_name: &str) -> String {
    base_name.chars().skip(5).take(7).collect()
}

/// Physical slot of a sighting: who owns it, what it is and where it stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotFields<'a> {
    pub provider: &'a str,
    pub element_type: &'a ElementType,
    pub district: &'a str,
    pub avenue: &'a str,
    pub street: &'a str,
    pub orientation: &'a str,
    pub brand: &'a str,
}

impl<'a> SlotFields<'a> {
    pub fn of(record: &'a RawOutViewRecord) -> Self {
        Self {
            provider: &record.provider,
            element_type: &record.element_type,
            district: &record.district,
            avenue: &record.avenue,
            street: &record.street,
            orientation: &record.orientation,
            brand: &record.brand,
        }
    }
}

/// Sightings of one slot on one exact day (Denominator 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DailySlotKey<'a> {
    pub date: NaiveDate,
    pub slot: SlotFields<'a>,
}

/// Sightings of one slot within one month token (Denominator 2 and the monthly rollup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthlySlotKey<'a> {
    pub month_token: &'a str,
    pub slot: SlotFields<'a>,
}

/// One physical element at one location during one month.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey<'a> {
    pub month_token: &'a str,
    pub year: i32,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub avenue: &'a str,
    pub street: &'a str,
    pub brand: &'a str,
    pub element_type: &'a ElementType,
    pub orientation: &'a str,
    pub tariff: OrderedFloat<f64>,
    pub provider: &'a str,
    pub district: &'a str,
    pub provider_code: &'a str,
}

impl<'a> GroupKey<'a> {
    pub fn new(record: &'a RawOutViewRecord, month_token: &'a str, year: i32) -> Self {
        Self {
            month_token,
            year,
            latitude: coordinate(record.latitude),
            longitude: coordinate(record.longitude),
            avenue: &record.avenue,
            street: &record.street,
            brand: &record.brand,
            element_type: &record.element_type,
            orientation: &record.orientation,
            tariff: OrderedFloat(record.tariff),
            provider: &record.provider,
            district: &record.district,
            provider_code: &record.provider_code,
        }
    }
}

/// One creative piece mounted once: finer than [`GroupKey`], it adds the
/// creative (item, version, category, advertiser) and the ISO week.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PieceKey<'a> {
    pub base_name: &'a str,
    pub provider: &'a str,
    pub element_type: &'a ElementType,
    pub district: &'a str,
    pub orientation: &'a str,
    pub street: &'a str,
    pub item: &'a str,
    pub version: &'a str,
    pub latitude: Coordinate,
    pub longitude: Coordinate,
    pub category: &'a str,
    pub tariff: OrderedFloat<f64>,
    pub advertiser: &'a str,
    pub month_token: &'a str,
    pub year: i32,
    pub week: u32,
}

impl<'a> PieceKey<'a> {
    pub fn new(record: &'a RawOutViewRecord, month_token: &'a str, year: i32, week: u32) -> Self {
        Self {
            base_name: &record.base_name,
            provider: &record.provider,
            element_type: &record.element_type,
            district: &record.district,
            orientation: &record.orientation,
            street: &record.street,
            item: &record.item,
            version: &record.version,
            latitude: coordinate(record.latitude),
            longitude: coordinate(record.longitude),
            category: &record.category,
            tariff: OrderedFloat(record.tariff),
            advertiser: &record.advertiser,
            month_token,
            year,
            week,
        }
    }
}
