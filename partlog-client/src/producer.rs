use std::ops::RangeInclusive;

use partlog_core::{common::error::Error, data::ProduceResponse};

use crate::client::Client;

pub const DEMO_ORDER_IDS: RangeInclusive<i32> = 100..=110;

pub fn order_payload(order_id: i32) -> String {
    format!(
        "orderId={} product=P{} qty={} price={}",
        order_id,
        order_id % 5,
        order_id % 3 + 1,
        100 + (order_id % 10) * 10
    )
}

/// Produces one order per id, keyed by the order id.
pub async fn produce_orders<I>(client: &Client, order_ids: I) -> Result<Vec<ProduceResponse>, Error>
where
    I: IntoIterator<Item = i32>,
{
    let mut responses = vec![];

    for order_id in order_ids {
        let response = client.produce(order_id, order_payload(order_id)).await?;

        log::info!(
            target: "partlog_client::producer",
            "Produced -> orderId={} key={} partition={} offset={}",
            order_id, order_id, response.partition, response.offset
        );

        responses.push(response);
    }

    Ok(responses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_payload() {
        assert_eq!("orderId=100 product=P0 qty=2 price=100", order_payload(100));
        assert_eq!("orderId=107 product=P2 qty=3 price=170", order_payload(107));
        assert_eq!(11, DEMO_ORDER_IDS.count());
    }
}
