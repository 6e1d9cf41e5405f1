//! Catalog seeding from YAML.
//!
//! ```yaml
//! products:
//!   - title: Riptide One-Piece
//!     description: Chlorine-resistant training suit.
//!     category: one-piece
//!     price: "89.00"
//!     images: [https://cdn.riptideswim.com/one-piece.jpg]
//!     size_inventory: { XS: 4, S: 10, M: 12, L: 6 }
//!     status: active
//! ```
//!
//! Products are matched by title. A match is replaced with the file's
//! fields; anything else is created.

use std::path::Path;

use serde::Deserialize;

use riptide_db::{ProductInput, ProductRepository};

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<ProductInput>,
}

/// Parse and validate a catalog file's contents.
fn parse_catalog(content: &str) -> Result<Vec<ProductInput>, CommandError> {
    let catalog: CatalogFile = serde_yaml::from_str(content)?;
    for product in &catalog.products {
        product
            .validate()
            .map_err(|reason| CommandError::InvalidProduct {
                title: product.title.clone(),
                reason,
            })?;
    }
    Ok(catalog.products)
}

/// Upsert products from a YAML file.
///
/// The whole file is validated before anything is written.
///
/// # Errors
///
/// Returns an error if the file can't be read or parsed, a product is
/// invalid, or a database write fails.
pub async fn products(file_path: &str) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    tracing::info!(path = %file_path, "Loading catalog");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let products = parse_catalog(&content)?;
    tracing::info!(products = products.len(), "Catalog validated");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    let (mut created, mut updated) = (0usize, 0usize);
    for input in &products {
        if let Some(id) = repo.find_by_title(&input.title).await? {
            repo.replace(id, input).await?;
            updated += 1;
        } else {
            repo.create(input).await?;
            created += 1;
        }
    }

    tracing::info!("Seeding complete!");
    tracing::info!("  Created: {created}");
    tracing::info!("  Updated: {updated}");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use riptide_core::{ProductStatus, Size};
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn test_parse_catalog() {
        let products = parse_catalog(
            r#"
products:
  - title: Riptide One-Piece
    price: "89.00"
    size_inventory: { xs: 4, M: 12 }
    status: active
  - title: Lap Jammer
    price: "54.50"
"#,
        )
        .unwrap();

        assert_eq!(products.len(), 2);
        let suit = products.first().unwrap();
        assert_eq!(suit.price, Decimal::new(8900, 2));
        assert_eq!(suit.status, ProductStatus::Active);
        assert_eq!(suit.size_inventory.available(&Size::parse("XS").unwrap()), 4);
        let jammer = products.last().unwrap();
        assert_eq!(jammer.status, ProductStatus::Draft);
        assert!(jammer.size_inventory.is_empty());
    }

    #[test]
    fn test_parse_catalog_rejects_invalid_product() {
        let err = parse_catalog(
            r#"
products:
  - title: Free Cap
    price: "-1"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, CommandError::InvalidProduct { .. }));
    }
}
