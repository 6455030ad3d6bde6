//! Fixed-layout order record carried through the pool.

/// Buy or sell, stored as the ASCII byte used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Side {
    Buy = b'B',
    Sell = b'S',
}

/// One order message, padded to exactly one cache line.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C, align(64))]
pub struct OrderMsg {
    pub ts_ns: u64,
    pub order_id: u64,
    pub instr_id: u32,
    pub qty: u32,
    pub price: f64,
    pub side: Side,
}

impl OrderMsg {
    pub fn new(ts_ns: u64, order_id: u64, instr_id: u32, price: f64, qty: u32, side: Side) -> Self {
        Self {
            ts_ns,
            order_id,
            instr_id,
            qty,
            price,
            side,
        }
    }

    /// Signed notional, negative for sells.
    pub fn notional(&self) -> f64 {
        let value = self.price * f64::from(self.qty);
        match self.side {
            Side::Buy => value,
            Side::Sell => -value,
        }
    }
}
