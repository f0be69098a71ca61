//! Moving average indicators.

use barflow_core::{ComputeNode, EngineResult, GraphBuilder, LineId, NodeError, NodeIo};

use crate::window::{check_period, mean, window, window_abs};
use crate::SingleLine;

/// Simple Moving Average (SMA).
///
/// Calculates the arithmetic mean of the last N values.
#[derive(Debug, Clone)]
pub struct Sma {
    name: String,
    period: usize,
}

impl Sma {
    /// Create a new SMA with the specified period.
    pub fn new(period: usize) -> Result<Self, NodeError> {
        check_period("SMA", period)?;
        Ok(Self {
            name: format!("SMA({})", period),
            period,
        })
    }

    /// Wire an SMA of `input` into `graph`.
    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        input: LineId,
        period: usize,
    ) -> EngineResult<SingleLine> {
        let handle = graph.add_node(Box::new(Self::new(period)?), &[input])?;
        Ok(SingleLine::from_handle(&handle)?)
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl ComputeNode for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[&'static str] {
        &["sma"]
    }

    fn lag(&self) -> usize {
        self.period - 1
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let values = window(io, 0, self.period)?;
        io.set_output(0, mean(&values))
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, io: &mut NodeIo<'_>, seed_index: usize, end: usize) -> Result<(), NodeError> {
        for i in seed_index..end {
            let values = window_abs(io, 0, i, self.period)?;
            io.set_output_abs(0, i, mean(&values))?;
        }
        Ok(())
    }
}

/// Exponential Moving Average (EMA).
///
/// Seeded with the SMA of the first N values, then smoothed with
/// `2 / (N + 1)`.
#[derive(Debug, Clone)]
pub struct Ema {
    name: String,
    period: usize,
    multiplier: f64,
}

impl Ema {
    /// Create a new EMA with the specified period.
    pub fn new(period: usize) -> Result<Self, NodeError> {
        check_period("EMA", period)?;
        Ok(Self {
            name: format!("EMA({})", period),
            period,
            multiplier: 2.0 / (period as f64 + 1.0),
        })
    }

    /// Create an EMA with a custom smoothing factor.
    pub fn with_multiplier(period: usize, multiplier: f64) -> Result<Self, NodeError> {
        check_period("EMA", period)?;
        if !(0.0..=1.0).contains(&multiplier) {
            return Err(NodeError::InvalidParameter(
                "EMA multiplier must be between 0 and 1".to_string(),
            ));
        }
        Ok(Self {
            name: format!("EMA({}, {})", period, multiplier),
            period,
            multiplier,
        })
    }

    /// Wire an EMA of `input` into `graph`.
    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        input: LineId,
        period: usize,
    ) -> EngineResult<SingleLine> {
        let handle = graph.add_node(Box::new(Self::new(period)?), &[input])?;
        Ok(SingleLine::from_handle(&handle)?)
    }

    #[inline]
    fn smooth(&self, previous: f64, price: f64) -> f64 {
        price * self.multiplier + previous * (1.0 - self.multiplier)
    }
}

impl ComputeNode for Ema {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[&'static str] {
        &["ema"]
    }

    fn lag(&self) -> usize {
        self.period - 1
    }

    fn seed(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let values = window(io, 0, self.period)?;
        io.set_output(0, mean(&values))
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let previous = io.output(0, -1)?;
        let price = io.input(0, 0)?;
        io.set_output(0, self.smooth(previous, price))
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, io: &mut NodeIo<'_>, seed_index: usize, end: usize) -> Result<(), NodeError> {
        if seed_index >= end {
            return Ok(());
        }
        let seed = window_abs(io, 0, seed_index, self.period)?;
        let mut ema = mean(&seed);
        io.set_output_abs(0, seed_index, ema)?;

        for i in seed_index + 1..end {
            ema = self.smooth(ema, io.input_abs(0, i)?);
            io.set_output_abs(0, i, ema)?;
        }
        Ok(())
    }
}
