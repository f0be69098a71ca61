//! Order arena with pending queue and OCO groups.

use std::collections::BTreeMap;

use barflow_core::{Order, OrderId};

/// Owns every order of a run, indexed by [`OrderId`].
#[derive(Debug, Default)]
pub struct OrderBook {
    orders: Vec<Order>,
    /// Alive orders in submission order
    pending: Vec<OrderId>,
    /// OCO group key -> members
    oco_groups: BTreeMap<OrderId, Vec<OrderId>>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id the next inserted order will get.
    pub fn next_id(&self) -> OrderId {
        OrderId(self.orders.len())
    }

    /// Store an order. Its id must be [`Self::next_id`].
    pub fn insert(&mut self, order: Order) -> OrderId {
        debug_assert_eq!(order.id, self.next_id());
        let id = order.id;
        if order.is_alive() {
            self.pending.push(id);
        }
        self.orders.push(order);
        id
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(id.index())
    }

    pub fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(id.index())
    }

    /// All orders in submission order.
    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    /// Snapshot of the pending ids.
    pub fn pending(&self) -> Vec<OrderId> {
        self.pending.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop terminal orders from the pending queue.
    pub fn prune(&mut self) {
        let orders = &self.orders;
        self.pending
            .retain(|id| orders.get(id.index()).is_some_and(Order::is_alive));
    }

    /// Put `id` in the same OCO group as `other`. Returns the group key.
    pub fn join_oco(&mut self, id: OrderId, other: OrderId) -> Option<OrderId> {
        let key = match self.get(other) {
            Some(order) => order.oco.unwrap_or(other),
            None => return None,
        };
        let group = self.oco_groups.entry(key).or_insert_with(|| vec![key]);
        if !group.contains(&id) {
            group.push(id);
        }
        for member in [key, id] {
            if let Some(order) = self.get_mut(member) {
                order.oco = Some(key);
            }
        }
        Some(key)
    }

    /// Alive members of the OCO group of `id`, excluding `id`.
    pub fn oco_siblings(&self, id: OrderId) -> Vec<OrderId> {
        let Some(key) = self.get(id).and_then(|o| o.oco) else {
            return Vec::new();
        };
        self.oco_groups
            .get(&key)
            .map(|group| {
                group
                    .iter()
                    .copied()
                    .filter(|m| *m != id && self.get(*m).is_some_and(Order::is_alive))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use barflow_core::{FeedId, OrderRequest, OrderStatus, Side, Validity};
    use rust_decimal_macros::dec;

    fn order(book: &OrderBook) -> Order {
        let req = OrderRequest::limit(FeedId(0), Side::Buy, dec!(1), dec!(10));
        let mut order =
            Order::from_request(book.next_id(), &req, Validity::GoodTillCancel, 0, 0, dec!(10));
        order.status = OrderStatus::Submitted;
        order
    }

    #[test]
    fn test_insert_and_prune() {
        let mut book = OrderBook::new();
        let a = book.insert(order(&book));
        let b = book.insert(order(&book));
        assert_eq!((a, b), (OrderId(0), OrderId(1)));
        assert_eq!(book.pending_count(), 2);

        book.get_mut(a).unwrap().status = OrderStatus::Canceled;
        book.prune();
        assert_eq!(book.pending(), vec![b]);
    }

    #[test]
    fn test_oco_groups_share_key() {
        let mut book = OrderBook::new();
        let a = book.insert(order(&book));
        let b = book.insert(order(&book));
        let c = book.insert(order(&book));
        assert_eq!(book.join_oco(b, a), Some(a));
        assert_eq!(book.join_oco(c, b), Some(a));
        assert_eq!(book.oco_siblings(c), vec![a, b]);

        book.get_mut(a).unwrap().status = OrderStatus::Completed;
        assert_eq!(book.oco_siblings(c), vec![b]);
        assert!(book.join_oco(c, OrderId(9)).is_none());
    }
}
