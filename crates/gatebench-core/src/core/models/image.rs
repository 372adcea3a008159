use std::fmt;

/// A regular voxel grid with interleaved channels.
///
/// `data` is laid out with channels fastest, then x, then y, then z, so its length is
/// `channels * size.iter().product()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub size: Vec<usize>,
    /// Voxel edge lengths in mm, one per dimension.
    pub spacing: Vec<f64>,
    /// World position of the first voxel's centre, in mm.
    pub origin: Vec<f64>,
    pub channels: usize,
    pub data: Vec<f64>,
}

/// Layout parameters shared by two images that can be compared voxel by voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeometry {
    pub size: Vec<usize>,
    pub spacing: Vec<f64>,
    pub origin: Vec<f64>,
    pub channels: usize,
}

impl fmt::Display for ImageGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size {:?}, spacing {:?}, origin {:?}, {} channel(s)",
            self.size, self.spacing, self.origin, self.channels
        )
    }
}

const GEOMETRY_EPS: f64 = 1e-6;

impl Image {
    /// A zero-filled image.
    pub fn new(size: Vec<usize>, spacing: Vec<f64>, origin: Vec<f64>, channels: usize) -> Self {
        let len = size.iter().product::<usize>() * channels;
        Self {
            size,
            spacing,
            origin,
            channels,
            data: vec![0.0; len],
        }
    }

    /// A single-channel image with unit spacing and zero origin.
    pub fn from_values(size: Vec<usize>, data: Vec<f64>) -> Self {
        let dims = size.len();
        Self {
            size,
            spacing: vec![1.0; dims],
            origin: vec![0.0; dims],
            channels: 1,
            data,
        }
    }

    pub fn dims(&self) -> usize {
        self.size.len()
    }

    pub fn voxel_count(&self) -> usize {
        self.size.iter().product()
    }

    /// `true` when `data`, `spacing` and `origin` agree with `size` and `channels`.
    pub fn is_consistent(&self) -> bool {
        self.channels > 0
            && self.spacing.len() == self.dims()
            && self.origin.len() == self.dims()
            && self.data.len() == self.voxel_count() * self.channels
    }

    pub fn geometry(&self) -> ImageGeometry {
        ImageGeometry {
            size: self.size.clone(),
            spacing: self.spacing.clone(),
            origin: self.origin.clone(),
            channels: self.channels,
        }
    }

    /// Same size and channel count, with spacing and origin equal within 1e-6 mm.
    pub fn same_geometry(&self, other: &Image) -> bool {
        let close = |a: &[f64], b: &[f64]| {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= GEOMETRY_EPS)
        };
        self.size == other.size
            && self.channels == other.channels
            && close(&self.spacing, &other.spacing)
            && close(&self.origin, &other.origin)
    }

    /// Linear voxel index of grid coordinates, x fastest.
    pub fn voxel_index(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.dims() {
            return None;
        }
        let mut index = 0;
        let mut stride = 1;
        for (&c, &n) in coords.iter().zip(&self.size) {
            if c >= n {
                return None;
            }
            index += c * stride;
            stride *= n;
        }
        Some(index)
    }

    /// Grid coordinate along `axis` of a linear voxel index.
    pub fn coordinate(&self, voxel: usize, axis: usize) -> usize {
        let stride: usize = self.size[..axis].iter().product();
        (voxel / stride) % self.size[axis]
    }

    pub fn get(&self, coords: &[usize], channel: usize) -> Option<f64> {
        let voxel = self.voxel_index(coords)?;
        (channel < self.channels)
            .then(|| self.data[voxel * self.channels + channel])
    }

    pub fn set(&mut self, coords: &[usize], channel: usize, value: f64) -> bool {
        match self.voxel_index(coords) {
            Some(voxel) if channel < self.channels => {
                self.data[voxel * self.channels + channel] = value;
                true
            }
            _ => false,
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voxel_index_runs_x_fastest() {
        let img = Image::new(vec![4, 3, 2], vec![1.0; 3], vec![0.0; 3], 1);
        assert_eq!(img.voxel_index(&[1, 0, 0]), Some(1));
        assert_eq!(img.voxel_index(&[0, 1, 0]), Some(4));
        assert_eq!(img.voxel_index(&[0, 0, 1]), Some(12));
        assert_eq!(img.voxel_index(&[4, 0, 0]), None);
        assert_eq!(img.coordinate(17, 0), 1);
        assert_eq!(img.coordinate(17, 1), 1);
        assert_eq!(img.coordinate(17, 2), 1);
    }

    #[test]
    fn channels_are_interleaved() {
        let mut img = Image::new(vec![2, 2], vec![1.0; 2], vec![0.0; 2], 2);
        assert!(img.set(&[1, 0], 1, 7.0));
        assert_eq!(img.data[3], 7.0);
        assert_eq!(img.get(&[1, 0], 1), Some(7.0));
        assert!(!img.set(&[1, 0], 2, 1.0));
        assert!(img.is_consistent());
    }

    #[test]
    fn geometry_comparison_tolerates_rounding() {
        let a = Image::new(vec![2, 2], vec![1.0, 1.0], vec![0.0, 0.0], 1);
        let mut b = a.clone();
        b.spacing[0] += 1e-9;
        assert!(a.same_geometry(&b));
        b.origin[1] = 0.5;
        assert!(!a.same_geometry(&b));
    }
}
