//! cui2vec model loading and similarity queries.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};

use tracing::{debug, info};

use crate::config::Cui2VecConfig;
use crate::error::{EmbedError, Result};

/// In-memory cui2vec embeddings.
pub struct Cui2VecModel {
    dimension: usize,
    cuis: Vec<String>,
    index: HashMap<String, usize>,
    /// Row-major `cuis.len() × dimension` matrix
    vectors: Vec<f32>,
    norms: Vec<f32>,
}

impl std::fmt::Debug for Cui2VecModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cui2VecModel")
            .field("dimension", &self.dimension)
            .field("cuis", &self.cuis.len())
            .finish()
    }
}

impl Cui2VecModel {
    pub fn load(config: &Cui2VecConfig) -> Result<Self> {
        info!("loading cui2vec from {}", config.path.display());
        let file = File::open(&config.path)?;
        let model = Self::from_reader(BufReader::new(file), config.dimension)?;
        info!("loaded {} cui2vec vectors", model.len());
        Ok(model)
    }

    /// Parse CSV with a header row, then `cui,v1,...,vN` per record.
    pub fn from_reader<R: Read>(reader: R, dimension: usize) -> Result<Self> {
        let mut model = Self {
            dimension,
            cuis: Vec::new(),
            index: HashMap::new(),
            vectors: Vec::new(),
            norms: Vec::new(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        debug!("skipping header: {} columns", reader.headers()?.len());

        for (ix, result) in reader.records().enumerate() {
            let record = result?;
            let row = ix + 1;
            let cui = record.get(0).unwrap_or_default().to_string();
            let start = model.vectors.len();
            for field in record.iter().skip(1) {
                let val: f32 = field.parse().map_err(|e| EmbedError::Parse {
                    line: row,
                    cui: cui.clone(),
                    message: format!("{}: <{}>", e, field),
                })?;
                model.vectors.push(val);
            }
            let actual = model.vectors.len() - start;
            if actual != dimension {
                return Err(EmbedError::Dimension {
                    line: row,
                    expected: dimension,
                    actual,
                });
            }
            let norm = model.vectors[start..].iter().map(|v| v * v).sum::<f32>().sqrt();
            model.norms.push(norm);
            model.index.insert(cui.clone(), model.cuis.len());
            model.cuis.push(cui);
        }
        Ok(model)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of embedded concepts.
    pub fn len(&self) -> usize {
        self.cuis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cuis.is_empty()
    }

    pub fn contains(&self, cui: &str) -> bool {
        self.index.contains_key(cui)
    }

    pub fn vector(&self, cui: &str) -> Option<&[f32]> {
        self.index.get(cui).map(|&ix| self.row(ix))
    }

    /// Cosine similarity of two concepts.
    pub fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        Ok(self.cosine(self.lookup(a)?, self.lookup(b)?))
    }

    /// The `topn` concepts most similar to `cui`, most similar first.
    pub fn similar_by_word(&self, cui: &str, topn: usize) -> Result<Vec<(String, f32)>> {
        let query = self.lookup(cui)?;
        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .filter(|&ix| ix != query)
            .map(|ix| (ix, self.cosine(query, ix)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(topn);
        Ok(scored
            .into_iter()
            .map(|(ix, sim)| (self.cuis[ix].clone(), sim))
            .collect())
    }

    fn lookup(&self, cui: &str) -> Result<usize> {
        self.index
            .get(cui)
            .copied()
            .ok_or_else(|| EmbedError::UnknownCui(cui.to_string()))
    }

    fn row(&self, ix: usize) -> &[f32] {
        &self.vectors[ix * self.dimension..(ix + 1) * self.dimension]
    }

    fn cosine(&self, a: usize, b: usize) -> f32 {
        let denom = self.norms[a] * self.norms[b];
        if denom == 0.0 {
            return 0.0;
        }
        let dot: f32 = self.row(a).iter().zip(self.row(b)).map(|(x, y)| x * y).sum();
        dot / denom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const CSV: &str = "\"\",\"V1\",\"V2\",\"V3\"
\"C0000001\",1.0,0.0,0.0
\"C0000002\",0.9,0.1,0.0
\"C0000003\",0.0,1.0,0.0
\"C0000004\",-1.0,0.0,0.0
";

    fn model() -> Cui2VecModel {
        Cui2VecModel::from_reader(Cursor::new(CSV), 3).unwrap()
    }

    #[test]
    fn test_load_and_lookup() {
        let m = model();
        assert_eq!(m.len(), 4);
        assert_eq!(m.dimension(), 3);
        assert_eq!(m.vector("C0000003"), Some(&[0.0, 1.0, 0.0][..]));
        assert!(m.vector("C9").is_none());
        assert!(!m.contains("\"C0000001\""));
    }

    #[test]
    fn test_similarity() {
        let m = model();
        assert!((m.similarity("C0000001", "C0000001").unwrap() - 1.0).abs() < 1e-6);
        assert!(m.similarity("C0000001", "C0000003").unwrap().abs() < 1e-6);
        assert!((m.similarity("C0000001", "C0000004").unwrap() + 1.0).abs() < 1e-6);
        assert!(matches!(
            m.similarity("C0000001", "C9"),
            Err(EmbedError::UnknownCui(_))
        ));
    }

    #[test]
    fn test_similar_by_word_orders_and_excludes_query() {
        let m = model();
        let sims = m.similar_by_word("C0000001", 10).unwrap();
        let cuis: Vec<_> = sims.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(cuis, vec!["C0000002", "C0000003", "C0000004"]);
        assert!(sims.windows(2).all(|w| w[0].1 >= w[1].1));
        assert_eq!(m.similar_by_word("C0000001", 1).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_error_reports_row_and_cui() {
        let csv = "h,a,b\nC1,1.0,2.0\nC2,1.0,oops\n";
        match Cui2VecModel::from_reader(Cursor::new(csv), 2).unwrap_err() {
            EmbedError::Parse { line, cui, .. } => {
                assert_eq!(line, 2);
                assert_eq!(cui, "C2");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_quoted_cui_with_comma() {
        let csv = "\"\",\"V1\",\"V2\"\n\"C1,x\",1.0,2.0\n\"C2 \"\"b\"\"\",0.5,0.5\n";
        let m = Cui2VecModel::from_reader(Cursor::new(csv), 2).unwrap();
        assert_eq!(m.len(), 2);
        assert_eq!(m.vector("C1,x"), Some(&[1.0, 2.0][..]));
        assert!(m.contains("C2 \"b\""));
    }

    #[test]
    fn test_dimension_mismatch() {
        let csv = "h,a,b\nC1,1.0\n";
        assert!(matches!(
            Cui2VecModel::from_reader(Cursor::new(csv), 2),
            Err(EmbedError::Dimension { line: 1, expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("cui2vec.csv");
        std::fs::write(&path, CSV).unwrap();
        let m = Cui2VecModel::load(&Cui2VecConfig::new(&path).with_dimension(3)).unwrap();
        assert_eq!(m.len(), 4);
    }
}
