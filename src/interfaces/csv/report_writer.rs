use crate::domain::order::Order;
use crate::domain::rating::Reputation;
use crate::error::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct OrderRow<'a> {
    order: u64,
    owner: &'a str,
    job_type: &'a str,
    duration: &'a str,
    charges: Decimal,
    status: &'static str,
    assigned_maid: Option<&'a str>,
    latitude: f64,
    longitude: f64,
}

impl<'a> From<&'a Order> for OrderRow<'a> {
    fn from(order: &'a Order) -> Self {
        Self {
            order: order.id.value(),
            owner: order.owner_id.as_str(),
            job_type: &order.terms.job_type,
            duration: &order.terms.duration,
            charges: order.terms.charges.value().normalize(),
            status: order.status.as_str(),
            assigned_maid: order.assigned_maid_id.as_ref().map(|id| id.as_str()),
            latitude: order.terms.location.latitude(),
            longitude: order.terms.location.longitude(),
        }
    }
}

#[derive(Serialize)]
struct ReputationRow<'a> {
    user: &'a str,
    ratings: u64,
    average: Option<Decimal>,
}

/// Writes engine state as CSV reports.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// One row per order:
    /// `order,owner,job_type,duration,charges,status,assigned_maid,latitude,longitude`.
    pub fn write_orders(&mut self, orders: &[Order]) -> Result<()> {
        for order in orders {
            self.writer.serialize(OrderRow::from(order))?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// One row per rated user: `user,ratings,average`.
    pub fn write_reputations(&mut self, reputations: &[Reputation]) -> Result<()> {
        for reputation in reputations {
            self.writer.serialize(ReputationRow {
                user: reputation.user_id.as_str(),
                ratings: reputation.rating_count,
                average: reputation.average(),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::UserId;
    use crate::domain::order::{JobTerms, OrderId, OrderStatus};
    use crate::domain::rating::Score;
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_orders() {
        let terms = JobTerms::new("Cleaning", "4 hours", dec!(500.00), (24.86, 67.01)).unwrap();
        let mut order = Order::new(OrderId::new(1), UserId::new("o1"), terms);
        order.status = OrderStatus::InProgress;
        order.assigned_maid_id = Some(UserId::new("M1"));
        let pending = Order::new(
            OrderId::new(2),
            UserId::new("o1"),
            order.terms.clone(),
        );

        let mut out = Vec::new();
        ReportWriter::new(&mut out)
            .write_orders(&[order, pending])
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "order,owner,job_type,duration,charges,status,assigned_maid,latitude,longitude"
        );
        assert_eq!(lines[1], "1,o1,Cleaning,4 hours,500,in_progress,M1,24.86,67.01");
        assert_eq!(lines[2], "2,o1,Cleaning,4 hours,500,pending,,24.86,67.01");
    }

    #[test]
    fn test_write_reputations() {
        let mut rep = Reputation::new(UserId::new("M1"));
        rep.record(Score::new(5).unwrap());
        rep.record(Score::new(4).unwrap());

        let mut out = Vec::new();
        ReportWriter::new(&mut out)
            .write_reputations(&[rep, Reputation::new(UserId::new("M2"))])
            .unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("user,ratings,average\n"));
        assert!(text.contains("M1,2,4.5\n"));
        assert!(text.contains("M2,0,\n"));
    }
}
