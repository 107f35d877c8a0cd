use crate::error::SpatialStatError;
use fnv::FnvHashMap as HashMap;
use serde::Serialize;

/// Categorical cluster labels, one per observation.
///
/// Categories are kept in sorted order of their names, so the same
/// input always yields the same category indices.
#[derive(Debug, Clone, Serialize)]
pub struct CategoricalLabels {
    names: Vec<Box<str>>,
    codes: Vec<usize>,
}

impl CategoricalLabels {
    /// Encode a vector of label names
    ///
    /// * `labels` - one label per observation
    pub fn from_names<S>(labels: &[S]) -> anyhow::Result<Self>
    where
        S: AsRef<str>,
    {
        if labels.is_empty() {
            return Err(SpatialStatError::EmptyLabelSet.into());
        }

        let mut names: Vec<Box<str>> = labels.iter().map(|x| Box::from(x.as_ref())).collect();
        names.sort();
        names.dedup();

        let name2code: HashMap<&str, usize> = names
            .iter()
            .enumerate()
            .map(|(k, x)| (x.as_ref(), k))
            .collect();

        let codes = labels
            .iter()
            .map(|x| name2code[x.as_ref()])
            .collect::<Vec<_>>();

        Ok(Self { names, codes })
    }

    /// Use pre-assigned codes against a fixed list of category names.
    /// Categories without any member are allowed. Names are sorted and
    /// the codes remapped accordingly; duplicate names are rejected.
    pub fn from_codes(codes: Vec<usize>, names: Vec<Box<str>>) -> anyhow::Result<Self> {
        if codes.is_empty() || names.is_empty() {
            return Err(SpatialStatError::EmptyLabelSet.into());
        }
        if let Some(&bad) = codes.iter().find(|&&k| k >= names.len()) {
            return Err(anyhow::anyhow!(
                "label code {} is out of range for {} categories",
                bad,
                names.len()
            ));
        }

        let mut order = (0..names.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| names[a].cmp(&names[b]));

        if let Some(w) = order.windows(2).find(|w| names[w[0]] == names[w[1]]) {
            return Err(anyhow::anyhow!("duplicate label name '{}'", names[w[0]]));
        }

        let mut remap = vec![0; names.len()];
        for (new_code, &old_code) in order.iter().enumerate() {
            remap[old_code] = new_code;
        }

        let sorted_names = order.iter().map(|&k| names[k].clone()).collect();
        let codes = codes.into_iter().map(|k| remap[k]).collect();

        Ok(Self {
            names: sorted_names,
            codes,
        })
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn num_categories(&self) -> usize {
        self.names.len()
    }

    pub fn names(&self) -> &[Box<str>] {
        &self.names
    }

    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    pub fn code_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|x| x.as_ref() == name)
    }

    /// number of observations in each category
    pub fn counts(&self) -> Vec<usize> {
        let mut ret = vec![0; self.names.len()];
        for &k in self.codes.iter() {
            ret[k] += 1;
        }
        ret
    }

    pub(crate) fn check_len(&self, npoints: usize) -> anyhow::Result<()> {
        if self.names.is_empty() || self.codes.is_empty() {
            return Err(SpatialStatError::EmptyLabelSet.into());
        }
        if self.codes.len() != npoints {
            return Err(SpatialStatError::LengthMismatch {
                points: npoints,
                labels: self.codes.len(),
            }
            .into());
        }
        Ok(())
    }
}
