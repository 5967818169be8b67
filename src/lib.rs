//! Legal Entities API Library
//!
//! This library provides a REST API over legal-entity ("client") records,
//! including Postgres storage, validation of Russian registration
//! identifiers (INN, KPP, OGRN) and enrichment of new records from the
//! DaData company directory.
//!
//! # Modules
//!
//! - `api`: HTTP-facing components.
//! - `core`: Domain logic, models and errors.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `db`: Database connection and schema bootstrap.
//! - `db_storage`: `ClientStore` trait and its Postgres implementation.
//! - `memory_storage`: In-process `ClientStore`.
//! - `dadata_client`: DaData company lookup client.
//! - `dadata_models`: DaData wire types.
//! - `enrichment`: Enrichment trigger and merge rules.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `openapi`: Generated API document and Swagger UI.
//! - `router`: Route table and middleware.
//! - `services`: Client and data source operations.
//! - `validation`: Field format checks.

pub mod api;
pub mod core;
pub mod integrations;

pub mod config;
pub mod dadata_client;
pub mod dadata_models;
pub mod db;
pub mod db_storage;
pub mod enrichment;
pub mod errors;
pub mod handlers;
pub mod memory_storage;
pub mod models;
pub mod openapi;
pub mod router;
pub mod services;
pub mod validation;
