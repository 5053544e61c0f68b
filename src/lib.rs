//! Ambulance Dispatch - Backend
//!
//! Servicio de despacho de ambulancias: registro de flota, reservas,
//! asignación atómica de ambulancia y conductor, seguimiento en vivo y
//! cola de prioridad para los despachadores.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::build_app;
pub use state::AppState;
