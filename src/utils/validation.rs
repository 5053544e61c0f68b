//! Utilidades de validación
//!
//! Funciones helper usadas por los `#[validate(custom = ...)]` de los DTOs
//! y por los servicios antes de tocar el store.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use validator::ValidationError;

lazy_static! {
    /// Matrícula: letras, dígitos, guiones y espacios (p. ej. "MH-12 AB 1234")
    static ref VEHICLE_NUMBER: Regex = Regex::new(r"^[A-Z0-9][A-Z0-9\- ]{2,18}[A-Z0-9]$").unwrap();
}

/// Normaliza una matrícula: mayúsculas y espacios colapsados
pub fn normalize_vehicle_number(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Validar formato de matrícula (tras normalizar)
pub fn validate_vehicle_number(value: &str) -> Result<(), ValidationError> {
    let normalized = normalize_vehicle_number(value);
    if !VEHICLE_NUMBER.is_match(&normalized) {
        let mut error = ValidationError::new("vehicle_number");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar que un string no esté vacío
pub fn validate_not_empty(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("not_empty");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Longitud de la columna `drivers.phone`
pub const PHONE_MAX_LEN: usize = 32;

/// Validar formato de teléfono (básico)
pub fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let clean_phone = value.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
    if clean_phone.len() < 10 || clean_phone.len() > 15 || value.chars().count() > PHONE_MAX_LEN {
        let mut error = ValidationError::new("phone");
        error.add_param("value".into(), &value.to_string());
        return Err(error);
    }
    Ok(())
}

/// Validar formato de coordenadas GPS
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        let mut error = ValidationError::new("latitude");
        error.add_param("value".into(), &lat);
        error.add_param("range".into(), &"-90.0 to 90.0".to_string());
        return Err(error);
    }

    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        let mut error = ValidationError::new("longitude");
        error.add_param("value".into(), &lng);
        error.add_param("range".into(), &"-180.0 to 180.0".to_string());
        return Err(error);
    }

    Ok(())
}

/// Las coordenadas opcionales van en pareja: ambas o ninguna
pub fn validate_optional_pair(
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<Option<(f64, f64)>, ValidationError> {
    match (lat, lng) {
        (None, None) => Ok(None),
        (Some(lat), Some(lng)) => validate_coordinates(lat, lng).map(|_| Some((lat, lng))),
        _ => Err(ValidationError::new("coordinate_pair")),
    }
}

/// Validar que un valor sea positivo
pub fn validate_positive<T: PartialOrd + num_traits::Zero + Serialize>(
    value: T,
) -> Result<(), ValidationError> {
    if value <= T::zero() {
        let mut error = ValidationError::new("positive");
        error.add_param("value".into(), &value);
        return Err(error);
    }
    Ok(())
}
