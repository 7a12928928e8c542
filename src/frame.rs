use crate::all::*;

// A pixel buffer prepared for optical flow.
pub struct Frame {
  pub image: Arc<Image>,
  pub pyramid: Pyramid,
}

pub struct Level<'a> {
  pub data: &'a[u8],
  pub width: usize,
  pub height: usize,
}

impl Frame {
  pub fn new(image: Arc<Image>, levels: usize) -> Frame {
    Frame {
      pyramid: Pyramid::new(&image, levels),
      image,
    }
  }

  pub fn get_level(&self, level: usize) -> Level {
    if level == 0 {
      Level {
        data: &self.image.data,
        width: self.image.width,
        height: self.image.height,
      }
    }
    else {
      let size = self.pyramid.size(level);
      Level {
        data: &self.pyramid.levels[level - 1].data,
        width: size[0],
        height: size[1],
      }
    }
  }
}
