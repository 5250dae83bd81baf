//! Paper trading: every order fills in full at its limit price.

use async_trait::async_trait;

use crate::domain::error::PolydashError;
use crate::domain::execution::{trading_fee, OrderTicket};
use crate::domain::trade::Fill;
use crate::ports::order_port::OrderPort;

pub struct PaperOrderAdapter {
    fee_rate: f64,
}

impl PaperOrderAdapter {
    pub fn new(fee_rate: f64) -> Self {
        Self { fee_rate }
    }
}

#[async_trait]
impl OrderPort for PaperOrderAdapter {
    fn name(&self) -> &str {
        "paper"
    }

    async fn submit(&self, ticket: &OrderTicket) -> Result<Fill, PolydashError> {
        if ticket.size <= 0.0 {
            return Err(PolydashError::OrderRejected {
                reason: format!("size must be positive, got {}", ticket.size),
            });
        }
        Ok(Fill {
            market_id: ticket.market_id.clone(),
            side: ticket.side,
            size: ticket.size,
            price: ticket.price,
            fee: trading_fee(ticket.size, ticket.price, self.fee_rate),
            order_id: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::Side;
    use approx::assert_relative_eq;

    fn ticket(size: f64) -> OrderTicket {
        OrderTicket {
            market_id: "demo_market_1".into(),
            side: Side::No,
            size,
            price: 0.52,
        }
    }

    #[tokio::test]
    async fn fills_full_size_at_limit_price() {
        let fill = PaperOrderAdapter::new(0.001).submit(&ticket(100.0)).await.unwrap();
        assert_eq!(fill.size, 100.0);
        assert_eq!(fill.price, 0.52);
        assert_eq!(fill.side, Side::No);
        assert_relative_eq!(fill.fee, 0.052, epsilon = 1e-12);
    }

    #[tokio::test]
    async fn rejects_empty_order() {
        let err = PaperOrderAdapter::new(0.0).submit(&ticket(0.0)).await.unwrap_err();
        assert!(matches!(err, PolydashError::OrderRejected { .. }));
    }
}
