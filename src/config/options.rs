//! Fixed dropdown options for catch records.

use chrono::{Datelike, NaiveDate, Weekday};
use once_cell::sync::Lazy;

/// Fishing areas shown on the area map.
pub static AREAS: Lazy<Vec<String>> = Lazy::new(|| (1..=10).map(|i| format!("Área {}", i)).collect());

pub const DAYS: [&str; 7] = [
    "Segunda", "Terça", "Quarta", "Quinta", "Sexta", "Sábado", "Domingo",
];

pub const SHIFTS: [&str; 3] = ["Manhã", "Tarde", "Noite"];

pub const GEAR: [&str; 5] = ["Heavy", "Light", "Medium", "Ultralight", "Ultra Light e Medium"];

pub const BAIT: [&str; 11] = [
    "Camarão",
    "Camarão morto",
    "Camarão vivo",
    "Jig",
    "Mexilhão",
    "Microjig",
    "Plug",
    "Plug de meia água",
    "Shad",
    "Stick",
    "Stick de Superfície",
];

pub const WEATHER: [&str; 6] = [
    "Céu claro",
    "Céu entre nuvens",
    "Céu limpo",
    "Chuva leve",
    "Nublado",
    "Sol entre nuvens",
];

pub const WIND: [&str; 7] = [
    "Sem vento",
    "Brisa",
    "Brisa Leve",
    "Fraco",
    "Moderado",
    "Forte",
    "Vento médio",
];

/// Weekday label for a date.
pub fn day_label(date: NaiveDate) -> &'static str {
    let index = match date.weekday() {
        Weekday::Mon => 0,
        Weekday::Tue => 1,
        Weekday::Wed => 2,
        Weekday::Thu => 3,
        Weekday::Fri => 4,
        Weekday::Sat => 5,
        Weekday::Sun => 6,
    };
    DAYS[index]
}

/// Whether `value` is one of `options`.
pub fn is_option(options: &[&str], value: &str) -> bool {
    options.iter().any(|o| *o == value)
}

/// Whether `value` names a known area.
pub fn is_area(value: &str) -> bool {
    AREAS.iter().any(|a| a == value)
}
