//! Volatility bands.

use barflow_core::{
    ComputeNode, EngineResult, GraphBuilder, LineId, NodeError, NodeId, NodeIo,
};

use crate::window::{check_period, mean, std_dev, window, window_abs};

/// Output lines of a [`BollingerBands`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BollingerLines {
    pub node: NodeId,
    pub mid: LineId,
    pub top: LineId,
    pub bot: LineId,
}

/// Bollinger Bands: SMA middle band with bands `devfactor` population
/// standard deviations above and below.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    name: String,
    period: usize,
    devfactor: f64,
}

impl BollingerBands {
    pub fn new(period: usize, devfactor: f64) -> Result<Self, NodeError> {
        check_period("BollingerBands", period)?;
        if !devfactor.is_finite() || devfactor < 0.0 {
            return Err(NodeError::InvalidParameter(
                "BollingerBands devfactor must be a non-negative number".to_string(),
            ));
        }
        Ok(Self {
            name: format!("BollingerBands({}, {})", period, devfactor),
            period,
            devfactor,
        })
    }

    pub fn attach<G: GraphBuilder + ?Sized>(
        graph: &mut G,
        input: LineId,
        period: usize,
        devfactor: f64,
    ) -> EngineResult<BollingerLines> {
        let handle = graph.add_node(Box::new(Self::new(period, devfactor)?), &[input])?;
        Ok(BollingerLines {
            node: handle.node,
            mid: handle.output(0)?,
            top: handle.output(1)?,
            bot: handle.output(2)?,
        })
    }

    fn bands(&self, values: &[f64]) -> (f64, f64, f64) {
        let mid = mean(values);
        let width = self.devfactor * std_dev(values, mid);
        (mid, mid + width, mid - width)
    }
}

impl ComputeNode for BollingerBands {
    fn name(&self) -> &str {
        &self.name
    }

    fn outputs(&self) -> &[&'static str] {
        &["mid", "top", "bot"]
    }

    fn lag(&self) -> usize {
        self.period - 1
    }

    fn next(&mut self, io: &mut NodeIo<'_>) -> Result<(), NodeError> {
        let values = window(io, 0, self.period)?;
        let (mid, top, bot) = self.bands(&values);
        io.set_output(0, mid)?;
        io.set_output(1, top)?;
        io.set_output(2, bot)
    }

    fn supports_bulk(&self) -> bool {
        true
    }

    fn bulk(&mut self, io: &mut NodeIo<'_>, seed_index: usize, end: usize) -> Result<(), NodeError> {
        for i in seed_index..end {
            let values = window_abs(io, 0, i, self.period)?;
            let (mid, top, bot) = self.bands(&values);
            io.set_output_abs(0, i, mid)?;
            io.set_output_abs(1, i, top)?;
            io.set_output_abs(2, i, bot)?;
        }
        Ok(())
    }
}
