//! zspread - Pairs Trading Decision Engine Library
//!
//! A statistical-arbitrage decision engine for two co-integrated
//! instruments: standardized spread deviations drive a position state
//! machine behind a once-per-day execution guard.
//!
//! # Modules
//!
//! - `domain`: Core decision logic (SpreadModel, PositionSizer, TradeStateMachine, Ledger)
//! - `ports`: Trait abstractions (MarketDataPort, AccountPort, ExecutionPort)
//! - `engine`: DailyTriggerCoordinator and the decision cycle
//! - `adapters`: Concrete collaborators (replay feed, paper gateway, scheduler, CLI)
//! - `config`: Configuration loading and validation

pub mod adapters;
pub mod config;
pub mod domain;
pub mod engine;
pub mod ports;
