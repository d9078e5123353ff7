//! Core library for song-request-relay: chat commands in, Spotify playlist changes out.
pub mod config;
pub mod error;
pub mod models;
pub mod api;
pub mod service;
pub mod dispatcher;
pub mod chat;
