// UI layer: provides a simple interactive menu using `dialoguer`.
// Every entry maps to one lifecycle operation on the client. Tables are
// read from JSON files holding an array of rows, header first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use crate::api::ModelLifecycleClient;
use crate::model::{ModelId, Table};

const MENU_ITEMS: &[&str] = &[
    "Upload table",
    "Train model",
    "Upload, train and predict",
    "Predict table",
    "Accuracy",
    "Random prediction",
    "Prediction columns",
    "Delete model",
    "Exit",
];

/// Main interactive menu. Runs until the user chooses "Exit".
///
/// The last model uploaded or typed in is offered as the default id for
/// the next prompt.
pub async fn main_menu(client: &ModelLifecycleClient) -> Result<()> {
    let mut current: Option<ModelId> = None;
    loop {
        let selection = Select::new()
            .with_prompt(format!("NextBrain ({}, {:?} mode)", client.backend_url(), client.mode()))
            .items(MENU_ITEMS)
            .default(0)
            .interact()?;

        // Errors from a single action are reported and the menu continues.
        let outcome = match selection {
            0 => handle_upload(client, &mut current).await,
            1 => handle_train(client, &mut current).await,
            2 => handle_upload_and_predict(client, &mut current).await,
            3 => handle_predict(client, &mut current).await,
            4 => {
                let id = prompt_model_id(&mut current)?;
                client.get_accuracy(&id).await.map(print_json).map_err(Into::into)
            }
            5 => {
                let id = prompt_model_id(&mut current)?;
                client.random_predict(&id).await.map(print_json).map_err(Into::into)
            }
            6 => {
                let id = prompt_model_id(&mut current)?;
                client
                    .get_predict_columns(&id)
                    .await
                    .map(print_json)
                    .map_err(Into::into)
            }
            7 => handle_delete(client, &mut current).await,
            _ => break,
        };
        if let Err(e) = outcome {
            println!("Failed: {:#}", e);
        }
    }
    Ok(())
}

async fn handle_upload(client: &ModelLifecycleClient, current: &mut Option<ModelId>) -> Result<()> {
    let table = prompt_table("Training table (JSON file)")?;
    let spinner = spinner("Uploading and importing...")?;
    let result = client.upload_model(&table).await;
    spinner.finish_and_clear();
    let id = result?;
    println!("Model {} imported", id);
    *current = Some(id);
    Ok(())
}

async fn handle_train(client: &ModelLifecycleClient, current: &mut Option<ModelId>) -> Result<()> {
    let id = prompt_model_id(current)?;
    let target: String = Input::new().with_prompt("Target column").interact_text()?;
    let is_lightning = Confirm::new()
        .with_prompt("Lightning training?")
        .default(false)
        .interact()?;

    let spinner = spinner("Training...")?;
    let result = client.train_model(&id, &target, is_lightning).await;
    spinner.finish_and_clear();
    result?;
    println!("Training for model {} finished", id);
    Ok(())
}

async fn handle_upload_and_predict(
    client: &ModelLifecycleClient,
    current: &mut Option<ModelId>,
) -> Result<()> {
    let table = prompt_table("Training table (JSON file)")?;
    let predict_table = prompt_table("Prediction table (JSON file)")?;
    let target: String = Input::new().with_prompt("Target column").interact_text()?;
    let is_lightning = Confirm::new()
        .with_prompt("Lightning training?")
        .default(false)
        .interact()?;

    let spinner = spinner("Uploading, training and predicting...")?;
    let result = client
        .upload_and_predict(&table, &predict_table, &target, is_lightning)
        .await;
    spinner.finish_and_clear();
    let (id, predictions) = result?;
    println!("Model {}", id);
    print_json(predictions);
    *current = Some(id);
    Ok(())
}

async fn handle_predict(client: &ModelLifecycleClient, current: &mut Option<ModelId>) -> Result<()> {
    let id = prompt_model_id(current)?;
    let table = prompt_table("Prediction table (JSON file)")?;
    let predictions = client.predict_model(&id, &table).await?;
    print_json(predictions);
    Ok(())
}

async fn handle_delete(client: &ModelLifecycleClient, current: &mut Option<ModelId>) -> Result<()> {
    let id = prompt_model_id(current)?;
    let sure = Confirm::new()
        .with_prompt(format!("Delete model {}?", id))
        .default(false)
        .interact()?;
    if !sure {
        return Ok(());
    }
    client.delete_model(&id).await?;
    println!("Model {} deleted", id);
    if current.as_ref() == Some(&id) {
        *current = None;
    }
    Ok(())
}

/// Ask for a model id, defaulting to the one used last.
fn prompt_model_id(current: &mut Option<ModelId>) -> Result<ModelId> {
    let mut input = Input::<ModelId>::new();
    input.with_prompt("Model id");
    if let Some(id) = current.clone() {
        input.default(id);
    }
    let id = input.interact_text()?;
    *current = Some(id.clone());
    Ok(id)
}

fn prompt_table(prompt: &str) -> Result<Table> {
    let path: String = Input::new().with_prompt(prompt).interact_text()?;
    load_table(&PathBuf::from(path))
}

/// Read a table from a JSON file containing an array of rows.
pub fn load_table(path: &Path) -> Result<Table> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&data).with_context(|| format!("Invalid table in {}", path.display()))
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

fn print_json(value: Value) {
    match serde_json::to_string_pretty(&value) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", value),
    }
}
