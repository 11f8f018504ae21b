//! 行・列の帯への分割

/// 浮動小数点の誤差でちょうど収まる帯が溢れないようにする許容量
const EPSILON: f32 = 0.01;

/// 連続する行（または列）の範囲。`end`は含みません。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Band {
    pub start: usize,
    pub end: usize,
    /// 容量を超えているが、これ以上分割できない帯
    pub oversized: bool,
}

impl Band {
    /// 全体を1つの帯にする
    pub fn whole(len: usize) -> Self {
        Self {
            start: 0,
            end: len,
            oversized: false,
        }
    }

    pub fn contains(&self, pos: usize) -> bool {
        (self.start..self.end).contains(&pos)
    }
}

/// 大きさの列を容量に収まる帯へ貪欲に分割する
///
/// 最初の帯は`first_capacity`、以降は`capacity`を上限にします。
/// `no_break_after[i]`が真の位置（結合セルの内側）では分割しません。
/// 分割できる最小の塊が容量を超える場合、その塊だけで1つの帯にし
/// `oversized`を立てます。
pub(crate) fn split_bands(
    sizes: &[f32],
    first_capacity: f32,
    capacity: f32,
    no_break_after: &[bool],
) -> Vec<Band> {
    let locked = |i: usize| no_break_after.get(i).copied().unwrap_or(false);
    let mut bands = Vec::new();
    let mut start = 0;

    while start < sizes.len() {
        let cap = if bands.is_empty() {
            first_capacity
        } else {
            capacity
        };

        let mut used = 0.0;
        let mut end = start;
        let mut last_break = None;
        while end < sizes.len() && used + sizes[end] <= cap + EPSILON {
            used += sizes[end];
            end += 1;
            if end == sizes.len() || !locked(end - 1) {
                last_break = Some(end);
            }
        }

        let band = match last_break {
            Some(end) => Band {
                start,
                end,
                oversized: false,
            },
            None => {
                let mut end = start + 1;
                while end < sizes.len() && locked(end - 1) {
                    end += 1;
                }
                Band {
                    start,
                    end,
                    oversized: true,
                }
            }
        };
        start = band.end;
        bands.push(band);
    }

    bands
}

/// 各位置がどの帯に属するか
pub(crate) fn band_index(bands: &[Band], len: usize) -> Vec<usize> {
    let mut index = vec![0; len];
    for (i, band) in bands.iter().enumerate() {
        index[band.start..band.end].fill(i);
    }
    index
}
