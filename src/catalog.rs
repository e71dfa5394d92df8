use serde::{Deserialize, Serialize};
use std::{path::Path, time::Instant};

/// One product row of the catalog dataset.
///
/// Field names on the left of `rename` are the dataset's CSV headers; output
/// uses the Rust names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(rename(deserialize = "BrandName"))]
    pub brand_name: String,

    #[serde(rename(deserialize = "Ratings"), deserialize_with = "csv::invalid_option", default)]
    pub rating: Option<f32>,

    #[serde(rename(deserialize = "URL"))]
    pub url: String,

    #[serde(rename(deserialize = "Product_id"))]
    pub product_id: String,

    #[serde(rename(deserialize = "Category"))]
    pub category: String,

    #[serde(rename(deserialize = "category_by_Gender"))]
    pub gender: String,

    #[serde(rename(deserialize = "SizeOption"))]
    pub size_options: String,

    #[serde(rename(deserialize = "Description"))]
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("malformed catalog row {row} in {path}: {source}")]
    Row {
        path: String,
        row: usize,
        #[source]
        source: csv::Error,
    },
}

/// Read-only product table keyed by row position.
///
/// Row `i` (0-based, header excluded) is the product behind index vector `i`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<ProductRecord>,
}

impl Catalog {
    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        Self { records }
    }

    /// Load the catalog from a CSV file with a header row.
    ///
    /// Only the first `limit` rows are kept when a limit is given; the index
    /// was built from that prefix.
    pub fn load(path: &Path, limit: Option<usize>) -> Result<Self, CatalogError> {
        let display = path.display().to_string();
        let now = Instant::now();

        let mut csv_reader = csv::Reader::from_path(path).map_err(|source| CatalogError::Read {
            path: display.clone(),
            source,
        })?;

        let limit = limit.unwrap_or(usize::MAX);
        let mut records = vec![];
        for (row, record) in csv_reader.deserialize::<ProductRecord>().take(limit).enumerate() {
            let record = record.map_err(|source| CatalogError::Row {
                path: display.clone(),
                row,
                source,
            })?;
            records.push(record);
        }

        log::debug!(
            "took {}ms to read {} catalog rows",
            now.elapsed().as_micros() as f64 / 1000.0,
            records.len()
        );

        Ok(Self::from_records(records))
    }

    /// Look up the product for an index id. Negative or unknown ids yield `None`.
    pub fn get_by_id(&self, id: i64) -> Option<&ProductRecord> {
        usize::try_from(id).ok().and_then(|idx| self.records.get(idx))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::write_catalog_csv;

    #[test]
    fn load_reads_dataset_columns() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_catalog_csv(tmp.path(), 3);

        let catalog = Catalog::load(&path, None).unwrap();
        assert_eq!(catalog.len(), 3);

        let first = catalog.get_by_id(0).unwrap();
        assert_eq!(first.brand_name, "Brand 0");
        assert_eq!(first.product_id, "1000");
        assert_eq!(first.gender, "Men");
        assert_eq!(first.size_options, "S,M,L");
        assert_eq!(first.rating, Some(4.0));

        let second = catalog.get_by_id(1).unwrap();
        assert_eq!(second.gender, "Women");
    }

    #[test]
    fn load_respects_row_limit() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_catalog_csv(tmp.path(), 10);

        let catalog = Catalog::load(&path, Some(4)).unwrap();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.get_by_id(4).is_none());
    }

    #[test]
    fn blank_or_garbage_rating_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("products.csv");
        std::fs::write(
            &path,
            "URL,Product_id,BrandName,Category,Individual_category,category_by_Gender,Description,SizeOption,Ratings,Reviews\n\
             https://example.com/a,1,Roadster,Topwear,tshirts,Men,Plain tee,\"S,M\",,0\n\
             https://example.com/b,2,Mango,Dresses,dresses,Women,Wrap dress,M,n/a,3\n",
        )
        .unwrap();

        let catalog = Catalog::load(&path, None).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get_by_id(0).unwrap().rating, None);
        assert_eq!(catalog.get_by_id(1).unwrap().rating, None);
        assert_eq!(catalog.get_by_id(0).unwrap().size_options, "S,M");
    }

    #[test]
    fn get_by_id_rejects_out_of_range() {
        let catalog = Catalog::from_records(vec![ProductRecord::default()]);
        assert!(catalog.get_by_id(0).is_some());
        assert!(catalog.get_by_id(1).is_none());
        assert!(catalog.get_by_id(-1).is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Catalog::load(Path::new("/nonexistent/products.csv"), None);
        assert!(matches!(result, Err(CatalogError::Read { .. })));
    }

    #[test]
    fn missing_column_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.csv");
        std::fs::write(&path, "URL,BrandName\nhttps://example.com,Roadster\n").unwrap();

        let result = Catalog::load(&path, None);
        assert!(matches!(result, Err(CatalogError::Row { row: 0, .. })));
    }
}
