//! PaperExchange (C7): a deterministic fill model plus an audit-grade
//! executions ledger.
//!
//! `PaperExchange` does not fetch prices itself — the caller (the portfolio
//! controller) supplies `market_price` from `mqk-md`. Every call, filled,
//! unfilled, or rejected, produces exactly one [`mqk_schemas::OrderExecution`]
//! row with `mode = paper`; callers are expected to persist it via `mqk-db`.

use chrono::Utc;
use mqk_schemas::{OrderExecution, OrderStatus, OrderType, Side, TradeMode};

/// Configured by `fee_rate` and `slippage_rate` (see `mqk-config::ExchangeConfig`).
#[derive(Debug, Clone, Copy)]
pub struct PaperExchange {
    pub fee_rate: f64,
    pub slippage_rate: f64,
}

/// Result of a `buy` call, alongside the ledger row that was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BuyOutcome {
    pub filled: bool,
    pub executed_price: f64,
    pub quantity: f64,
    pub quote_amount: f64,
    pub fee: f64,
    pub message: String,
}

/// Result of a `sell_all` call, alongside the ledger row that was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SellOutcome {
    pub filled: bool,
    pub executed_price: f64,
    pub quantity: f64,
    pub gross_amount: f64,
    pub fee: f64,
    pub net_amount: f64,
    pub message: String,
}

fn order_type(limit_price: Option<f64>) -> OrderType {
    match limit_price {
        Some(_) => OrderType::Limit,
        None => OrderType::Market,
    }
}

fn now_stamp() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl PaperExchange {
    pub fn new(fee_rate: f64, slippage_rate: f64) -> Self {
        Self { fee_rate, slippage_rate }
    }

    /// `market_price <= 0` is rejected outright. Otherwise the fill price is
    /// bumped up by `slippage_rate`; a limit price below the fill price
    /// leaves the order unfilled.
    pub fn buy(
        &self,
        symbol: &str,
        market_price: f64,
        quote_amount: f64,
        limit_price: Option<f64>,
        metadata: &str,
    ) -> (BuyOutcome, OrderExecution) {
        let created_at = now_stamp();

        if market_price <= 0.0 {
            let message = "Price unavailable".to_string();
            let exec = OrderExecution {
                symbol: symbol.to_string(),
                side: Side::Buy,
                order_type: order_type(limit_price),
                status: OrderStatus::Rejected,
                requested_price: limit_price,
                executed_price: Some(0.0),
                quantity: Some(0.0),
                quote_amount: Some(quote_amount),
                fee_amount: Some(0.0),
                mode: TradeMode::Paper,
                message: message.clone(),
                metadata: metadata.to_string(),
                created_at,
            };
            return (
                BuyOutcome {
                    filled: false,
                    executed_price: 0.0,
                    quantity: 0.0,
                    quote_amount,
                    fee: 0.0,
                    message,
                },
                exec,
            );
        }

        let exec_price = market_price * (1.0 + self.slippage_rate);
        if let Some(limit) = limit_price {
            if exec_price > limit {
                let message = "Limit not reached".to_string();
                let exec = OrderExecution {
                    symbol: symbol.to_string(),
                    side: Side::Buy,
                    order_type: OrderType::Limit,
                    status: OrderStatus::Unfilled,
                    requested_price: Some(limit),
                    executed_price: Some(0.0),
                    quantity: Some(0.0),
                    quote_amount: Some(quote_amount),
                    fee_amount: Some(0.0),
                    mode: TradeMode::Paper,
                    message: message.clone(),
                    metadata: metadata.to_string(),
                    created_at,
                };
                return (
                    BuyOutcome {
                        filled: false,
                        executed_price: 0.0,
                        quantity: 0.0,
                        quote_amount,
                        fee: 0.0,
                        message,
                    },
                    exec,
                );
            }
        }

        let quantity = quote_amount / exec_price;
        let fee = quote_amount * self.fee_rate;
        let message = "Filled".to_string();
        let exec = OrderExecution {
            symbol: symbol.to_string(),
            side: Side::Buy,
            order_type: order_type(limit_price),
            status: OrderStatus::Filled,
            requested_price: limit_price,
            executed_price: Some(exec_price),
            quantity: Some(quantity),
            quote_amount: Some(quote_amount),
            fee_amount: Some(fee),
            mode: TradeMode::Paper,
            message: message.clone(),
            metadata: metadata.to_string(),
            created_at,
        };
        (
            BuyOutcome {
                filled: true,
                executed_price: exec_price,
                quantity,
                quote_amount,
                fee,
                message,
            },
            exec,
        )
    }

    /// `market_price <= 0` or `quantity <= 0` is rejected outright. Otherwise
    /// the fill price is knocked down by `slippage_rate`; a limit price above
    /// the fill price leaves the order unfilled.
    pub fn sell_all(
        &self,
        symbol: &str,
        market_price: f64,
        quantity: f64,
        limit_price: Option<f64>,
        metadata: &str,
    ) -> (SellOutcome, OrderExecution) {
        let created_at = now_stamp();

        if market_price <= 0.0 || quantity <= 0.0 {
            let message = "Invalid price or quantity".to_string();
            let exec = OrderExecution {
                symbol: symbol.to_string(),
                side: Side::Sell,
                order_type: order_type(limit_price),
                status: OrderStatus::Rejected,
                requested_price: limit_price,
                executed_price: Some(0.0),
                quantity: Some(quantity),
                quote_amount: Some(0.0),
                fee_amount: Some(0.0),
                mode: TradeMode::Paper,
                message: message.clone(),
                metadata: metadata.to_string(),
                created_at,
            };
            return (
                SellOutcome {
                    filled: false,
                    executed_price: 0.0,
                    quantity,
                    gross_amount: 0.0,
                    fee: 0.0,
                    net_amount: 0.0,
                    message,
                },
                exec,
            );
        }

        let exec_price = market_price * (1.0 - self.slippage_rate);
        if let Some(limit) = limit_price {
            if exec_price < limit {
                let message = "Limit not reached".to_string();
                let exec = OrderExecution {
                    symbol: symbol.to_string(),
                    side: Side::Sell,
                    order_type: OrderType::Limit,
                    status: OrderStatus::Unfilled,
                    requested_price: Some(limit),
                    executed_price: Some(0.0),
                    quantity: Some(quantity),
                    quote_amount: Some(0.0),
                    fee_amount: Some(0.0),
                    mode: TradeMode::Paper,
                    message: message.clone(),
                    metadata: metadata.to_string(),
                    created_at,
                };
                return (
                    SellOutcome {
                        filled: false,
                        executed_price: 0.0,
                        quantity,
                        gross_amount: 0.0,
                        fee: 0.0,
                        net_amount: 0.0,
                        message,
                    },
                    exec,
                );
            }
        }

        let gross = quantity * exec_price;
        let fee = gross * self.fee_rate;
        let net = gross - fee;
        let message = "Filled".to_string();
        let exec = OrderExecution {
            symbol: symbol.to_string(),
            side: Side::Sell,
            order_type: order_type(limit_price),
            status: OrderStatus::Filled,
            requested_price: limit_price,
            executed_price: Some(exec_price),
            quantity: Some(quantity),
            quote_amount: Some(gross),
            fee_amount: Some(fee),
            mode: TradeMode::Paper,
            message: message.clone(),
            metadata: metadata.to_string(),
            created_at,
        };
        (
            SellOutcome {
                filled: true,
                executed_price: exec_price,
                quantity,
                gross_amount: gross,
                fee,
                net_amount: net,
                message,
            },
            exec,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> PaperExchange {
        PaperExchange::new(0.001, 0.0005)
    }

    #[test]
    fn buy_fills_at_market_plus_slippage() {
        let (outcome, exec) = exchange().buy("BTC-USD", 100.0, 1000.0, None, "");
        assert!(outcome.filled);
        assert_eq!(outcome.executed_price, 100.05);
        assert!((outcome.quantity - 1000.0 / 100.05).abs() < 1e-9);
        assert_eq!(outcome.fee, 1.0);
        assert_eq!(exec.status, OrderStatus::Filled);
        assert_eq!(exec.mode, TradeMode::Paper);
    }

    #[test]
    fn buy_rejects_non_positive_price() {
        let (outcome, exec) = exchange().buy("BTC-USD", 0.0, 1000.0, None, "");
        assert!(!outcome.filled);
        assert_eq!(outcome.message, "Price unavailable");
        assert_eq!(exec.status, OrderStatus::Rejected);
    }

    #[test]
    fn buy_unfilled_when_limit_below_execution_price() {
        let (outcome, exec) = exchange().buy("BTC-USD", 100.0, 1000.0, Some(100.0), "");
        assert!(!outcome.filled);
        assert_eq!(outcome.message, "Limit not reached");
        assert_eq!(exec.status, OrderStatus::Unfilled);
        assert_eq!(exec.order_type, OrderType::Limit);
    }

    #[test]
    fn sell_all_fills_at_market_minus_slippage() {
        let (outcome, exec) = exchange().sell_all("BTC-USD", 100.0, 10.0, None, "");
        assert!(outcome.filled);
        assert_eq!(outcome.executed_price, 99.95);
        assert_eq!(outcome.gross_amount, 999.5);
        assert!((outcome.fee - 0.9995).abs() < 1e-9);
        assert!((outcome.net_amount - (999.5 - 0.9995)).abs() < 1e-9);
        assert_eq!(exec.status, OrderStatus::Filled);
    }

    #[test]
    fn sell_all_rejects_zero_quantity() {
        let (outcome, exec) = exchange().sell_all("BTC-USD", 100.0, 0.0, None, "");
        assert!(!outcome.filled);
        assert_eq!(outcome.message, "Invalid price or quantity");
        assert_eq!(exec.status, OrderStatus::Rejected);
    }

    #[test]
    fn sell_all_unfilled_when_limit_above_execution_price() {
        let (outcome, exec) = exchange().sell_all("BTC-USD", 100.0, 10.0, Some(100.0), "");
        assert!(!outcome.filled);
        assert_eq!(outcome.message, "Limit not reached");
        assert_eq!(exec.status, OrderStatus::Unfilled);
    }
}
