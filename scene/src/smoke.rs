//! Smoke simulation domains (volume data)

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmokeId(pub u32);

/// One resolution level of a smoke simulation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SmokeGrid {
    pub resolution: [u32; 3],
    /// Density per cell, 0..1
    pub density: Vec<f32>,
    /// Flame intensity per cell, present when the domain burns fuel
    pub flame: Option<Vec<f32>>,
    /// Smoke color per cell, present for colored smoke
    pub color: Option<Vec<[f32; 3]>>,
}

impl SmokeGrid {
    pub fn new(resolution: [u32; 3], density: Vec<f32>) -> Self {
        Self {
            resolution,
            density,
            flame: None,
            color: None,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.resolution.iter().map(|&r| r as usize).product()
    }

    pub fn has_colors(&self) -> bool {
        self.color.is_some()
    }

    pub fn has_fuel(&self) -> bool {
        self.flame.is_some()
    }
}

/// A smoke domain with its base grid, optional high resolution grid and
/// the shadow volume (always at base resolution)
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeDomain {
    pub id: SmokeId,
    pub base: SmokeGrid,
    pub high_res: Option<SmokeGrid>,
    pub shadow: Vec<f32>,
}

impl SmokeDomain {
    pub fn new(id: SmokeId, base: SmokeGrid) -> Self {
        let shadow = vec![1.0; base.cell_count()];
        Self {
            id,
            base,
            high_res: None,
            shadow,
        }
    }

    pub fn with_high_res(mut self, grid: SmokeGrid) -> Self {
        self.high_res = Some(grid);
        self
    }
}
