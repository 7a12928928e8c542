use crate::all::*;

// Successively halved copies of an image, not including the full resolution level.
pub struct Pyramid {
  pub levels: Vec<Image>,
}

impl Pyramid {
  pub fn new(image: &Image, level_count: usize) -> Pyramid {
    Pyramid {
      levels: compute_levels(image, level_count),
    }
  }

  pub fn size(&self, level: usize) -> [usize; 2] {
    let image = &self.levels[level - 1];
    [image.width, image.height]
  }
}

fn compute_levels(image: &Image, level_count: usize) -> Vec<Image> {
  let mut levels = vec![];
  levels.resize_with(level_count, Image::empty);
  for level_ind in 0..level_count {
    // Borrowing level-1 non-mutably and level+0 mutably needs a split.
    let (parents, children) = levels.split_at_mut(level_ind);
    let parent = if level_ind > 0 { &parents[level_ind - 1] } else { image };
    downscale(parent, &mut children[0]);
  }
  levels
}

// 2x2 box filter. Odd trailing rows and columns are dropped.
fn downscale(parent: &Image, child: &mut Image) {
  child.width = parent.width / 2;
  child.height = parent.height / 2;
  child.data.clear();
  child.data.reserve(child.width * child.height);
  for y in 0..child.height {
    for x in 0..child.width {
      let sum = parent.value(2 * x, 2 * y) as u32
        + parent.value(2 * x + 1, 2 * y) as u32
        + parent.value(2 * x, 2 * y + 1) as u32
        + parent.value(2 * x + 1, 2 * y + 1) as u32;
      child.data.push(((sum + 2) / 4) as u8);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_downscale() {
    let image = Image::new(4, 2, vec![
      0, 4, 8, 8,
      4, 8, 8, 8,
    ]).unwrap();
    let pyramid = Pyramid::new(&image, 2);
    assert_eq!(pyramid.levels.len(), 2);
    assert_eq!(pyramid.levels[0], Image::new(2, 1, vec![4, 8]).unwrap());
    assert_eq!(pyramid.size(2), [1, 0]);
  }
}
