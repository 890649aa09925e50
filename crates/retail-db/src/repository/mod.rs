//! # Repository Module
//!
//! One repository per table family. Repositories own the read side and the
//! single-row writes; anything that moves stock lives in
//! [`processor`](crate::processor).
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Handler                                                                │
//! │     │  db.products().list_by_brand("coke")                             │
//! │     ▼                                                                   │
//! │  ProductRepository ──── SQL ────► SQLite                               │
//! │                                                                         │
//! │  Each module also exposes `pub(crate) fn xxx_in(conn, ..)` helpers     │
//! │  that run on a caller's transaction:                                   │
//! │                                                                         │
//! │  SaleProcessor ── tx ──► sale::insert_in(&mut tx, ..)                  │
//! │                          sale::insert_item_in(&mut tx, ..)             │
//! │                          StockLedger::adjust(&mut tx, ..)              │
//! │                   tx.commit()                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`user::UserRepository`] - accounts and credentials
//! - [`branch::BranchRepository`] - branches and the headquarters flag
//! - [`product::ProductRepository`] - catalog
//! - [`stock::StockRepository`] - inventory views and admin adjustment
//! - [`sale::SaleRepository`] - sales and sync status
//! - [`order::OrderRepository`] - online orders
//! - [`payment::PaymentRepository`] - order payments and checkout tokens
//! - [`restock::RestockRepository`] - transfer history, HQ overview, suggestions
//! - [`report::ReportRepository`] - sales reports and stock alerts

pub mod branch;
pub mod order;
pub mod payment;
pub mod product;
pub mod report;
pub mod restock;
pub mod sale;
pub mod stock;
pub mod user;
