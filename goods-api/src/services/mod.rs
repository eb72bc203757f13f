//! Service layer for the Goods API.
//!
//! Route handlers stay thin and call into [`GoodsService`], which owns the
//! coordination between the relational store, the snapshot cache and the
//! change bus.

pub mod goods_service;

pub use goods_service::GoodsService;
