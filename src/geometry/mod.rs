/// A descriptor for the filter-geometry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PaddedSquare {
    side: usize,
    padding: usize,
}

/// A descriptor for input and intermediary image geometry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageGeometry {
    side: usize,
    channels: usize,
}

impl ImageGeometry {
    pub fn new(side: usize, channels: usize) -> ImageGeometry {
        ImageGeometry { side, channels }
    }
    pub fn channels(&self) -> usize {
        self.channels
    }
    /// The geometry of the feature map a valid (unpadded, stride 1) convolution with
    /// `filter_shape` and `out_channels` filters produces from this one.
    pub fn after_conv(&self, filter_shape: &PaddedSquare, out_channels: usize) -> ImageGeometry {
        ImageGeometry {
            side: (self.side + 2 * filter_shape.padding + 1).saturating_sub(filter_shape.side()),
            channels: out_channels,
        }
    }
    /// The geometry after non-overlapping pooling with a window of `stride`.
    pub fn after_pool(&self, stride: usize) -> ImageGeometry {
        ImageGeometry {
            side: self.side / stride,
            channels: self.channels,
        }
    }
}

pub trait Square {
    fn side(&self) -> usize;
    fn num_elems(&self) -> usize;
}

impl PaddedSquare {
    pub fn new(side: usize, padding: usize) -> PaddedSquare {
        PaddedSquare { side, padding }
    }
    pub fn from_side(side: usize) -> PaddedSquare {
        PaddedSquare::new(side, 0)
    }
}

impl Square for PaddedSquare {
    fn side(&self) -> usize {
        self.side
    }
    fn num_elems(&self) -> usize {
        self.side() * self.side()
    }
}

impl Square for ImageGeometry {
    fn side(&self) -> usize {
        self.side
    }
    fn num_elems(&self) -> usize {
        self.side() * self.side() * self.channels
    }
}
