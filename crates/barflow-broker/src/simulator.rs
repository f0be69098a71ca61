//! Bar-driven market simulator.
//!
//! The engine feeds every instrument's current bar through [`MarketSimulator::update_bar`]
//! and calls [`MarketSimulator::process`] once per tick after the strategy hook.
//! Order and trade events queue up as [`Notification`]s until drained.

use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};

use barflow_core::{
    Bar, BracketOrders, Broker, Execution, FeedId, Order, OrderId, OrderRequest, OrderStatus,
    OrderType, Position, PositionUpdate, RejectReason, Side, Trade, TradeId, TradeStatus,
};

use crate::book::OrderBook;
use crate::config::BrokerConfig;
use crate::matching::{is_eligible, match_order, BarPrices, MatchResult};
use crate::slippage::PriceContext;

/// Event queued for the strategy.
#[derive(Debug, Clone)]
pub enum Notification {
    /// Snapshot of an order after a status change or partial fill
    Order(Order),
    /// Snapshot of a trade after it opened, changed or closed
    Trade(Trade),
}

/// Last bar seen for an instrument.
#[derive(Debug, Clone, Copy)]
struct MarketState {
    bar: Bar,
    prices: BarPrices,
    bar_no: usize,
}

/// Simulated broker matching orders against bars.
#[derive(Debug)]
pub struct MarketSimulator {
    config: BrokerConfig,
    cash: Decimal,
    book: OrderBook,
    positions: BTreeMap<FeedId, Position>,
    market: BTreeMap<FeedId, MarketState>,
    trades: Vec<Trade>,
    open_trades: BTreeMap<FeedId, TradeId>,
    notifications: VecDeque<Notification>,
}

impl MarketSimulator {
    pub fn new(config: BrokerConfig) -> Self {
        tracing::debug!(cash = %config.initial_cash, "Market simulator created");
        Self {
            cash: config.initial_cash,
            config,
            book: OrderBook::new(),
            positions: BTreeMap::new(),
            market: BTreeMap::new(),
            trades: Vec::new(),
            open_trades: BTreeMap::new(),
            notifications: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Record the current bar of `instrument`. `bar_no` is the instrument's
    /// clock length (1 for the first bar).
    pub fn update_bar(&mut self, instrument: FeedId, bar: &Bar, bar_no: usize) {
        self.market.insert(
            instrument,
            MarketState {
                bar: *bar,
                prices: BarPrices::from(bar),
                bar_no,
            },
        );
    }

    /// Current bar of `instrument`, if any was seen.
    pub fn current_bar(&self, instrument: FeedId) -> Option<&Bar> {
        self.market.get(&instrument).map(|m| &m.bar)
    }

    /// All orders in submission order.
    pub fn orders(&self) -> &[Order] {
        self.book.orders()
    }

    /// Alive orders.
    pub fn open_orders(&self) -> Vec<&Order> {
        self.book
            .pending()
            .into_iter()
            .filter_map(|id| self.book.get(id))
            .filter(|o| o.is_alive())
            .collect()
    }

    /// All trades, open and closed.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Positions of every instrument that was ever traded.
    pub fn positions(&self) -> &BTreeMap<FeedId, Position> {
        &self.positions
    }

    /// Take the queued notifications in the order they happened.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    pub fn has_notifications(&self) -> bool {
        !self.notifications.is_empty()
    }

    fn notify_order(&mut self, id: OrderId) {
        if let Some(order) = self.book.get(id) {
            tracing::debug!(
                order = %order.id,
                instrument = %order.instrument,
                side = %order.side,
                order_type = %order.order_type,
                status = %order.status,
                "Order update"
            );
            self.notifications.push_back(Notification::Order(order.clone()));
        }
    }

    fn create_order(&mut self, request: &OrderRequest) -> Order {
        let (created_at, created_bar, created_price) = match self.market.get(&request.instrument) {
            Some(m) => (m.bar.timestamp, m.bar_no, m.prices.close),
            None => (0, 0, Decimal::ZERO),
        };
        let validity = request.validity.unwrap_or(self.config.default_validity);
        Order::from_request(
            self.book.next_id(),
            request,
            validity,
            created_at,
            created_bar,
            created_price,
        )
    }

    fn validate(request: &OrderRequest) -> Option<RejectReason> {
        if request.size <= Decimal::ZERO {
            return Some(RejectReason::ZeroSize);
        }
        let missing = match request.order_type {
            OrderType::Market | OrderType::Close => false,
            OrderType::Limit => request.limit_price.is_none(),
            OrderType::Stop => request.stop_price.is_none(),
            OrderType::StopLimit => request.stop_price.is_none() || request.limit_price.is_none(),
            OrderType::StopTrail => {
                request.trail_amount.is_none() && request.trail_percent.is_none()
            }
        };
        missing.then_some(RejectReason::MissingPrice)
    }

    /// Store a new order, `Rejected` or `Submitted`, and notify it.
    fn insert(&mut self, request: &OrderRequest, parent: Option<OrderId>) -> OrderId {
        let mut order = self.create_order(request);
        order.parent = parent;
        order.active = parent.is_none();
        order.oco = None;
        match Self::validate(request) {
            Some(reason) => {
                order.status = OrderStatus::Rejected;
                order.reason = Some(reason);
                tracing::info!(order = %order.id, reason = ?reason, "Order rejected at submission");
            }
            None => order.status = OrderStatus::Submitted,
        }
        let id = self.book.insert(order);
        if let Some(other) = request.oco {
            if self.book.get(id).is_some_and(Order::is_alive) {
                self.book.join_oco(id, other);
            }
        }
        self.notify_order(id);
        id
    }

    /// Submit a parent order with a protective stop and a profit target.
    ///
    /// The children trade the opposite side for the same size, stay inactive
    /// until the parent completes and then cancel each other.
    pub fn submit_bracket(
        &mut self,
        parent: OrderRequest,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> BracketOrders {
        let parent_id = self.insert(&parent, None);
        let exit = parent.side.opposite();

        let stop_req = OrderRequest::stop(parent.instrument, exit, parent.size, stop_price);
        let stop_loss = self.insert(&stop_req, Some(parent_id));

        let limit_req =
            OrderRequest::limit(parent.instrument, exit, parent.size, limit_price).with_oco(stop_loss);
        let take_profit = self.insert(&limit_req, Some(parent_id));

        if let Some(order) = self.book.get_mut(parent_id) {
            order.children = vec![stop_loss, take_profit];
        }
        if self.book.get(parent_id).is_some_and(|o| !o.is_alive()) {
            self.fail_children(parent_id);
        }

        BracketOrders {
            parent: parent_id,
            stop_loss,
            take_profit,
        }
    }

    /// Move an alive order to a terminal failure state and cascade to its
    /// bracket children and OCO siblings.
    fn finish(&mut self, id: OrderId, status: OrderStatus, reason: RejectReason) {
        let Some(order) = self.book.get_mut(id) else {
            return;
        };
        if !order.is_alive() {
            return;
        }
        order.status = status;
        order.reason = Some(reason);
        if matches!(status, OrderStatus::Margin | OrderStatus::Rejected) {
            tracing::info!(order = %id, status = %status, reason = ?reason, "Order failed");
        }
        self.notify_order(id);
        self.fail_children(id);
        // bracket children are failed together by their parent
        if reason != RejectReason::ParentFailed {
            self.cancel_siblings(id);
        }
    }

    fn fail_children(&mut self, id: OrderId) {
        let children = self
            .book
            .get(id)
            .map(|o| o.children.clone())
            .unwrap_or_default();
        for child in children {
            self.finish(child, OrderStatus::Canceled, RejectReason::ParentFailed);
        }
    }

    fn cancel_siblings(&mut self, id: OrderId) {
        for sibling in self.book.oco_siblings(id) {
            self.finish(sibling, OrderStatus::Canceled, RejectReason::OcoSibling);
        }
    }

    fn activate_children(&mut self, id: OrderId) {
        let children = self
            .book
            .get(id)
            .map(|o| o.children.clone())
            .unwrap_or_default();
        for child in children {
            let Some(order) = self.book.get(child) else {
                continue;
            };
            let Some(m) = self.market.get(&order.instrument).copied() else {
                continue;
            };
            if let Some(order) = self.book.get_mut(child) {
                if order.is_alive() {
                    order.active = true;
                    order.created_at = m.bar.timestamp;
                    order.created_bar = m.bar_no;
                    order.created_price = m.prices.close;
                    tracing::debug!(order = %child, parent = %id, "Bracket child activated");
                }
            }
        }
    }

    /// Run one matching step over the instruments whose bar advanced or was
    /// updated this tick.
    pub fn process(&mut self, instruments: &[FeedId]) {
        self.apply_cancels();
        self.accept_submitted();

        let mut instruments = instruments.to_vec();
        instruments.sort_unstable();
        instruments.dedup();
        for instrument in instruments {
            self.match_instrument(instrument);
        }
        self.book.prune();
    }

    fn apply_cancels(&mut self) {
        for id in self.book.pending() {
            if self
                .book
                .get(id)
                .is_some_and(|o| o.cancel_requested && o.is_alive())
            {
                self.finish(id, OrderStatus::Canceled, RejectReason::Requested);
            }
        }
    }

    /// Cash needed to accept `order`: cost of the part opening a position plus
    /// commission, at its reference price.
    fn acceptance_cost(&self, order: &Order, projected: Decimal) -> Decimal {
        let comm = self.config.commission_for(order.instrument);
        let price = if order.created_price.is_zero() {
            order
                .limit_price
                .or(order.stop_price)
                .unwrap_or(order.created_price)
        } else {
            order.created_price
        };
        let signed = order.signed_remaining();
        let opening = if projected.is_zero() || projected.is_sign_positive() == signed.is_sign_positive() {
            signed.abs()
        } else {
            (signed.abs() - projected.abs()).max(Decimal::ZERO)
        };
        comm.operation_cost(opening, price) + comm.commission(signed, price)
    }

    fn accept_submitted(&mut self) {
        let mut available = self.cash;
        let mut projected: BTreeMap<FeedId, Decimal> = self
            .positions
            .iter()
            .map(|(k, p)| (*k, p.size))
            .collect();

        for id in self.book.pending() {
            let Some(order) = self.book.get(id) else {
                continue;
            };
            if order.status != OrderStatus::Submitted {
                continue;
            }
            if !order.active {
                if let Some(o) = self.book.get_mut(id) {
                    o.status = OrderStatus::Accepted;
                }
                self.notify_order(id);
                continue;
            }

            let position = projected.get(&order.instrument).copied().unwrap_or_default();
            let cost = self.acceptance_cost(order, position);
            if cost > available {
                tracing::info!(order = %id, cost = %cost, available = %available, "Insufficient cash at acceptance");
                self.finish(id, OrderStatus::Margin, RejectReason::Margin);
                continue;
            }
            available -= cost;
            *projected.entry(order.instrument).or_default() += order.signed_remaining();
            if let Some(o) = self.book.get_mut(id) {
                o.status = OrderStatus::Accepted;
            }
            self.notify_order(id);
        }
    }

    fn match_instrument(&mut self, instrument: FeedId) {
        let Some(m) = self.market.get(&instrument).copied() else {
            return;
        };
        let market_fill = self.config.market_fill;

        for id in self.book.pending() {
            let Some(order) = self.book.get(id) else {
                continue;
            };
            if order.instrument != instrument
                || !order.active
                || !matches!(order.status, OrderStatus::Accepted | OrderStatus::Partial)
            {
                continue;
            }
            if order.is_expired(m.bar.timestamp, m.bar_no) {
                self.finish(id, OrderStatus::Expired, RejectReason::Expired);
                continue;
            }
            if !is_eligible(order, m.bar_no, market_fill) {
                continue;
            }

            let Some(order) = self.book.get_mut(id) else {
                continue;
            };
            let MatchResult::Fill { price, at_open } = match_order(order, &m.prices, market_fill)
            else {
                continue;
            };
            let ctx = PriceContext {
                side: order.side,
                at_open,
                limit: order.limit_price.filter(|_| {
                    matches!(order.order_type, OrderType::Limit | OrderType::StopLimit)
                }),
                low: m.prices.low,
                high: m.prices.high,
            };
            let price = self.config.slippage.fill_price(price, &ctx);
            let size = self
                .config
                .fill_policy
                .fillable(order.remaining(), m.prices.volume);
            if size.is_zero() {
                tracing::debug!(order = %id, volume = %m.prices.volume, "No fillable size on this bar");
                continue;
            }
            self.execute(id, size, price, &m);
        }
    }

    /// Fill `size` units of order `id` at `price`.
    fn execute(&mut self, id: OrderId, size: Decimal, price: Decimal, m: &MarketState) {
        let Some(order) = self.book.get(id) else {
            return;
        };
        let instrument = order.instrument;
        let side = order.side;
        let has_fills = !order.filled.is_zero();
        let comm = *self.config.commission_for(instrument);

        let signed = side.sign() * size;
        let before = self.positions.get(&instrument).copied().unwrap_or_default();
        let mut after = before;
        let update = after.update(signed, price);

        let commission = comm.commission(signed, price);
        let pnl = comm.pnl(-update.closed, before.price, price);
        let delta = comm.cash_delta(update.closed, update.opened, before.price, price, commission);

        if self.cash + delta < Decimal::ZERO {
            if has_fills {
                tracing::debug!(order = %id, "Cash shortfall, retrying next bar");
            } else {
                tracing::info!(order = %id, needed = %(-delta), cash = %self.cash, "Insufficient cash at execution");
                self.finish(id, OrderStatus::Margin, RejectReason::Margin);
            }
            return;
        }

        self.cash += delta;
        self.positions.insert(instrument, after);

        let execution = Execution {
            timestamp: m.bar.timestamp,
            bar: m.bar_no,
            size: signed,
            price,
            closed: update.closed,
            opened: update.opened,
            pnl,
            commission,
            position_size: after.size,
            position_price: after.price,
        };
        let completed = match self.book.get_mut(id) {
            Some(order) => {
                order.add_execution(execution);
                order.is_completed()
            }
            None => false,
        };
        self.notify_order(id);

        self.update_trades(instrument, &before, &update, price, commission, pnl, m);

        self.cancel_siblings(id);
        if completed {
            self.activate_children(id);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn update_trades(
        &mut self,
        instrument: FeedId,
        before: &Position,
        update: &PositionUpdate,
        price: Decimal,
        commission: Decimal,
        pnl: Decimal,
        m: &MarketState,
    ) {
        let comm = *self.config.commission_for(instrument);
        // split by units; `opened` is non-zero in the second branch
        let close_commission = if update.opened.is_zero() {
            commission
        } else {
            commission * update.closed.abs() / (update.closed.abs() + update.opened.abs())
        };
        let open_commission = commission - close_commission;

        if !update.closed.is_zero() {
            if let Some(trade_id) = self.open_trades.get(&instrument).copied() {
                let remaining = before.size + update.closed;
                let value = comm.position_value(remaining, before.price, price);
                if let Some(trade) = self.trades.get_mut(trade_id.index()) {
                    let status = trade.update(
                        update.closed,
                        price,
                        value,
                        close_commission,
                        pnl,
                        m.bar.timestamp,
                        m.bar_no,
                    );
                    if status == TradeStatus::Closed {
                        self.open_trades.remove(&instrument);
                        tracing::debug!(trade = %trade_id, pnl = %trade.pnl, "Trade closed");
                    }
                    self.notifications.push_back(Notification::Trade(trade.clone()));
                }
            }
        }

        if !update.opened.is_zero() {
            let trade_id = match self.open_trades.get(&instrument) {
                Some(id) => *id,
                None => {
                    let id = TradeId(self.trades.len());
                    self.trades.push(Trade::new(id, instrument));
                    self.open_trades.insert(instrument, id);
                    tracing::debug!(trade = %id, instrument = %instrument, "Trade opened");
                    id
                }
            };
            let value = comm.position_value(update.size, update.price, price);
            if let Some(trade) = self.trades.get_mut(trade_id.index()) {
                trade.update(
                    update.opened,
                    price,
                    value,
                    open_commission,
                    Decimal::ZERO,
                    m.bar.timestamp,
                    m.bar_no,
                );
                self.notifications.push_back(Notification::Trade(trade.clone()));
            }
        }
    }

    /// Mark price of `instrument`: last close, or the position price when no
    /// bar was seen.
    fn mark(&self, instrument: FeedId, position: &Position) -> Decimal {
        self.market
            .get(&instrument)
            .map(|m| m.prices.close)
            .unwrap_or(position.price)
    }

    /// Value of the open position in `instrument`.
    pub fn position_value(&self, instrument: FeedId) -> Decimal {
        let Some(position) = self.positions.get(&instrument) else {
            return Decimal::ZERO;
        };
        self.config
            .commission_for(instrument)
            .position_value(position.size, position.price, self.mark(instrument, position))
    }

    /// Submit a market order bringing the position in `instrument` to
    /// `target`. Returns `None` when already there.
    pub fn order_target_size(&mut self, instrument: FeedId, target: Decimal) -> Option<OrderId> {
        let current = self.get_position(instrument).size;
        let diff = target - current;
        if diff.is_zero() {
            return None;
        }
        let side = if diff > Decimal::ZERO { Side::Buy } else { Side::Sell };
        Some(self.submit(OrderRequest::market(instrument, side, diff.abs())))
    }
}

impl Broker for MarketSimulator {
    fn submit(&mut self, request: OrderRequest) -> OrderId {
        self.insert(&request, None)
    }

    fn cancel(&mut self, order: OrderId) -> bool {
        match self.book.get_mut(order) {
            Some(o) if o.is_alive() => {
                o.cancel_requested = true;
                true
            }
            _ => false,
        }
    }

    fn get_cash(&self) -> Decimal {
        self.cash
    }

    fn get_value(&self) -> Decimal {
        self.cash
            + self
                .positions
                .keys()
                .map(|instrument| self.position_value(*instrument))
                .sum::<Decimal>()
    }

    fn get_position(&self, instrument: FeedId) -> Position {
        self.positions.get(&instrument).copied().unwrap_or_default()
    }

    fn get_order(&self, order: OrderId) -> Option<&Order> {
        self.book.get(order)
    }
}
