//! Reference data import for tags and ingredients.
//!
//! Both files are headerless UTF-8 CSV: `name,color,slug` for tags and
//! `name,measurement_unit` for ingredients. Rows that already exist are
//! skipped, so running the import twice leaves the tables unchanged.

use std::{fs::File, io::Read, path::Path};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::{error, info};
use sqlx::{Pool, Postgres};

use crate::{
    actions::{insert_ingredients, insert_tags},
    config::Settings,
    error::{ServiceError, TypeError},
    form::{NewIngredient, NewTag},
};

fn read_records<R: Read>(reader: R, columns: usize) -> Result<Vec<StringRecord>, TypeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut records = vec![];
    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let record = record.map_err(|e| TypeError::new(&format!("Line {line}: {e}")))?;

        if record.len() != columns {
            return Err(TypeError::new(&format!(
                "Line {line}: expected {columns} columns, got {}",
                record.len()
            )));
        }
        records.push(record);
    }

    Ok(records)
}

pub fn parse_tags<R: Read>(reader: R, settings: &Settings) -> Result<Vec<NewTag>, TypeError> {
    read_records(reader, 3)?
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let tag = NewTag {
                name: record[0].to_string(),
                color: record[1].to_string(),
                slug: record[2].to_string(),
            };
            tag.validate(settings)
                .map_err(|e| TypeError::new(&format!("Line {}: {e}", index + 1)))?;
            Ok(tag)
        })
        .collect()
}

pub fn parse_ingredients<R: Read>(
    reader: R,
    settings: &Settings,
) -> Result<Vec<NewIngredient>, TypeError> {
    read_records(reader, 2)?
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let ingredient = NewIngredient {
                name: record[0].to_string(),
                measurement_unit: record[1].to_string(),
            };
            ingredient
                .validate(settings)
                .map_err(|e| TypeError::new(&format!("Line {}: {e}", index + 1)))?;
            Ok(ingredient)
        })
        .collect()
}

fn open_reference_file(category: &str, path: &Path) -> Result<Option<File>, ServiceError> {
    if !path.exists() {
        error!(
            "File with {category} was not found, expected it at {}",
            path.display()
        );
        return Ok(None);
    }

    File::open(path).map(Some).map_err(|e| {
        error!("Could not open {}: {e}", path.display());
        ServiceError::from(TypeError::new(&format!("Could not open {}", path.display())))
    })
}

/// Imports tags, then ingredients. A missing file is logged and skipped.
pub async fn load_reference_data(
    settings: &Settings,
    pool: &Pool<Postgres>,
) -> Result<(), ServiceError> {
    if let Some(file) = open_reference_file("tags", &settings.tags_csv)? {
        let tags = parse_tags(file, settings)?;
        let inserted = insert_tags(&tags, pool).await?;
        info!(
            "Imported file with tags: {inserted} new of {} rows",
            tags.len()
        );
    }

    if let Some(file) = open_reference_file("ingredients", &settings.ingredients_csv)? {
        let ingredients = parse_ingredients(file, settings)?;
        let inserted = insert_ingredients(&ingredients, pool).await?;
        info!(
            "Imported file with ingredients: {inserted} new of {} rows",
            ingredients.len()
        );
    }

    Ok(())
}
