use crate::all::*;

// Row-major grayscale image storage. This is the pixel buffer exchanged with
// frame sources and trackers.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
  pub data: Vec<u8>,
  pub width: usize,
  pub height: usize,
}

impl Image {
  pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Image> {
    if data.len() != width * height {
      bail!("Image data has {} bytes, expected {}x{}.", data.len(), width, height);
    }
    Ok(Image { data, width, height })
  }

  pub fn filled(width: usize, height: usize, value: u8) -> Image {
    Image {
      data: vec![value; width * height],
      width,
      height,
    }
  }

  pub fn empty() -> Image {
    Image {
      data: vec![],
      width: 0,
      height: 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  #[inline(always)]
  pub fn value(&self, x: usize, y: usize) -> u8 {
    self.data[y * self.width + x]
  }

  #[inline(always)]
  pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
    self.data[y * self.width + x] = value;
  }
}

// Element access in the manner of `image[y][x]`.
impl Index<usize> for Image {
  type Output = [u8];
  fn index(&self, y: usize) -> &Self::Output {
    &self.data[y * self.width .. (y + 1) * self.width]
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_new_checks_length() {
    assert!(Image::new(2, 2, vec![0; 3]).is_err());
    let image = Image::new(2, 2, vec![1, 2, 3, 4]).unwrap();
    assert_eq!(image.value(1, 0), 2);
    assert_eq!(image[1], [3, 4]);
  }
}
