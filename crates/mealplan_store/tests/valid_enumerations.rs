mod common;

use chrono::Duration;
use common::{fixture, seed_ingredient, seed_instrument, seed_unit, start, Fixture};
use mealplan_store::model::{
    IngredientAttributeType, QueryFilter, ValidIngredientPreparationCreationInput,
    ValidIngredientPreparationUpdateInput, ValidIngredientStateCreationInput,
    ValidIngredientStateIngredientCreationInput, ValidIngredientStateUpdateInput,
    ValidMeasurementUnitConversionCreationInput, ValidMeasurementUnitConversionUpdateInput,
    ValidPreparationCreationInput, ValidPreparationInstrumentCreationInput,
    ValidPreparationUpdateInput,
};
use mealplan_store::repo::{
    SqliteValidIngredientPreparationRepository, SqliteValidIngredientStateIngredientRepository,
    SqliteValidIngredientStateRepository, SqliteValidMeasurementUnitConversionRepository,
    SqliteValidPreparationInstrumentRepository, SqliteValidPreparationRepository,
    ValidIngredientPreparationRepository, ValidIngredientStateIngredientRepository,
    ValidIngredientStateRepository, ValidMeasurementUnitConversionRepository,
    ValidPreparationInstrumentRepository, ValidPreparationRepository,
};
use mealplan_store::ErrorKind;

fn vocabulary() -> Fixture {
    let fx = fixture();
    seed_ingredient(&fx.conn, "ing-onion", "onion");
    seed_ingredient(&fx.conn, "ing-garlic", "garlic");
    seed_instrument(&fx.conn, "inst-knife", "knife");
    seed_instrument(&fx.conn, "inst-board", "cutting board");
    seed_unit(&fx.conn, "unit-cup", "cup");
    seed_unit(&fx.conn, "unit-ml", "milliliter");
    seed_unit(&fx.conn, "unit-tbsp", "tablespoon");
    fx
}

fn preparation(id: &str, name: &str) -> ValidPreparationCreationInput {
    ValidPreparationCreationInput {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        icon_path: String::new(),
        past_tense: format!("{name}d"),
        slug: id.to_string(),
        yields_nothing: false,
        restrict_to_ingredients: true,
        minimum_ingredient_count: 1,
        maximum_ingredient_count: Some(3),
        minimum_instrument_count: 1,
        maximum_instrument_count: None,
        temperature_required: false,
        time_estimate_required: false,
    }
}

fn state(id: &str, name: &str) -> ValidIngredientStateCreationInput {
    ValidIngredientStateCreationInput {
        id: id.to_string(),
        name: name.to_string(),
        past_tense: name.to_string(),
        slug: id.to_string(),
        description: String::new(),
        icon_path: String::new(),
        attribute_type: IngredientAttributeType::Texture,
    }
}

fn conversion(id: &str, from: &str, to: &str, ingredient: Option<&str>) -> ValidMeasurementUnitConversionCreationInput {
    ValidMeasurementUnitConversionCreationInput {
        id: id.to_string(),
        from_unit: from.to_string(),
        to_unit: to.to_string(),
        only_for_ingredient: ingredient.map(str::to_string),
        modifier: 236.6,
        notes: String::new(),
    }
}

#[test]
fn preparation_crud_and_search() {
    let fx = vocabulary();
    let repo = SqliteValidPreparationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let dice = repo.create_valid_preparation(&fx.ctx, &preparation("dice", "dice")).unwrap();
    repo.create_valid_preparation(&fx.ctx, &preparation("mince", "mince")).unwrap();
    assert_eq!(dice.maximum_ingredient_count, Some(3));
    assert_eq!(dice.maximum_instrument_count, None);
    assert_eq!(repo.get_valid_preparation(&fx.ctx, "dice").unwrap(), dice);

    let found = repo.search_valid_preparations(&fx.ctx, "MIN").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, "mince");

    let page = repo
        .list_valid_preparations(&fx.ctx, &QueryFilter::default().with_limit(1))
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_count, 2);

    fx.clock.advance(Duration::minutes(10));
    let updated = repo
        .update_valid_preparation(
            &fx.ctx,
            "dice",
            &ValidPreparationUpdateInput {
                name: Some("small dice".to_string()),
                temperature_required: Some(true),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.name, "small dice");
    assert!(updated.temperature_required);
    assert_eq!(updated.slug, "dice");
    assert_eq!(updated.last_updated_at, Some(start() + Duration::minutes(10)));

    repo.archive_valid_preparation(&fx.ctx, "dice").unwrap();
    assert!(!repo.valid_preparation_exists(&fx.ctx, "dice").unwrap());
    let err = repo.archive_valid_preparation(&fx.ctx, "dice").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn preparation_count_ranges_are_checked_on_create_and_update() {
    let fx = vocabulary();
    let repo = SqliteValidPreparationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let mut inverted = preparation("dice", "dice");
    inverted.minimum_ingredient_count = 5;
    let err = repo.create_valid_preparation(&fx.ctx, &inverted).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    repo.create_valid_preparation(&fx.ctx, &preparation("dice", "dice")).unwrap();
    let err = repo
        .update_valid_preparation(
            &fx.ctx,
            "dice",
            &ValidPreparationUpdateInput {
                minimum_ingredient_count: Some(4),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut same_slug = preparation("dice-2", "dice");
    same_slug.slug = "dice".to_string();
    let err = repo.create_valid_preparation(&fx.ctx, &same_slug).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn ingredient_state_crud() {
    let fx = vocabulary();
    let repo = SqliteValidIngredientStateRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let created = repo
        .create_valid_ingredient_state(&fx.ctx, &state("translucent", "translucent"))
        .unwrap();
    assert_eq!(repo.get_valid_ingredient_state(&fx.ctx, "translucent").unwrap(), created);
    assert_eq!(
        repo.search_valid_ingredient_states(&fx.ctx, "lucent").unwrap(),
        vec![created]
    );

    let updated = repo
        .update_valid_ingredient_state(
            &fx.ctx,
            "translucent",
            &ValidIngredientStateUpdateInput {
                attribute_type: Some(IngredientAttributeType::Appearance),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.attribute_type, IngredientAttributeType::Appearance);
    assert_eq!(updated.name, "translucent");

    let err = repo
        .update_valid_ingredient_state(
            &fx.ctx,
            "ghost",
            &ValidIngredientStateUpdateInput::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    repo.archive_valid_ingredient_state(&fx.ctx, "translucent").unwrap();
    let page = repo
        .list_valid_ingredient_states(&fx.ctx, &QueryFilter::default())
        .unwrap();
    assert!(page.items.is_empty());
    assert_eq!(page.total_count, 0);
}

#[test]
fn ingredient_preparation_links_hydrate_both_sides() {
    let fx = vocabulary();
    let preparations = SqliteValidPreparationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let repo = SqliteValidIngredientPreparationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    preparations.create_valid_preparation(&fx.ctx, &preparation("dice", "dice")).unwrap();
    preparations.create_valid_preparation(&fx.ctx, &preparation("mince", "mince")).unwrap();

    let link = |id: &str, prep: &str, ingredient: &str| ValidIngredientPreparationCreationInput {
        id: id.to_string(),
        notes: String::new(),
        valid_preparation_id: prep.to_string(),
        valid_ingredient_id: ingredient.to_string(),
    };
    let diced_onion = repo
        .create_valid_ingredient_preparation(&fx.ctx, &link("vip-1", "dice", "ing-onion"))
        .unwrap();
    assert_eq!(diced_onion.preparation.name, "dice");
    assert_eq!(diced_onion.ingredient.name, "onion");
    repo.create_valid_ingredient_preparation(&fx.ctx, &link("vip-2", "mince", "ing-garlic"))
        .unwrap();
    repo.create_valid_ingredient_preparation(&fx.ctx, &link("vip-3", "mince", "ing-onion"))
        .unwrap();

    let err = repo
        .create_valid_ingredient_preparation(&fx.ctx, &link("vip-4", "dice", "ing-onion"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let for_mince = repo
        .list_valid_ingredient_preparations_for_preparation(&fx.ctx, "mince", &QueryFilter::default())
        .unwrap();
    assert_eq!(for_mince.total_count, 2);
    let for_onion = repo
        .list_valid_ingredient_preparations_for_ingredient(&fx.ctx, "ing-onion", &QueryFilter::default())
        .unwrap();
    let ids: Vec<_> = for_onion.items.iter().map(|l| l.id.as_str()).collect();
    assert_eq!(ids, vec!["vip-1", "vip-3"]);
    assert_eq!(
        repo.list_valid_ingredient_preparations(&fx.ctx, &QueryFilter::default())
            .unwrap()
            .total_count,
        3
    );

    let moved = repo
        .update_valid_ingredient_preparation(
            &fx.ctx,
            "vip-1",
            &ValidIngredientPreparationUpdateInput {
                valid_ingredient_id: Some("ing-garlic".to_string()),
                notes: Some("fine".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(moved.ingredient.name, "garlic");
    assert_eq!(moved.preparation.id, "dice");

    repo.archive_valid_ingredient_preparation(&fx.ctx, "vip-1").unwrap();
    assert!(!repo.valid_ingredient_preparation_exists(&fx.ctx, "vip-1").unwrap());
}

#[test]
fn ingredient_state_links_are_scoped_by_either_side() {
    let fx = vocabulary();
    let states = SqliteValidIngredientStateRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let repo = SqliteValidIngredientStateIngredientRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    states.create_valid_ingredient_state(&fx.ctx, &state("caramelized", "caramelized")).unwrap();

    let link = |id: &str, ingredient: &str| ValidIngredientStateIngredientCreationInput {
        id: id.to_string(),
        notes: String::new(),
        valid_ingredient_state_id: "caramelized".to_string(),
        valid_ingredient_id: ingredient.to_string(),
    };
    let created = repo
        .create_valid_ingredient_state_ingredient(&fx.ctx, &link("visi-1", "ing-onion"))
        .unwrap();
    assert_eq!(created.ingredient_state.slug, "caramelized");
    repo.create_valid_ingredient_state_ingredient(&fx.ctx, &link("visi-2", "ing-garlic"))
        .unwrap();

    let for_state = repo
        .list_valid_ingredient_state_ingredients_for_state(&fx.ctx, "caramelized", &QueryFilter::default())
        .unwrap();
    assert_eq!(for_state.total_count, 2);
    let for_garlic = repo
        .list_valid_ingredient_state_ingredients_for_ingredient(&fx.ctx, "ing-garlic", &QueryFilter::default())
        .unwrap();
    assert_eq!(for_garlic.items.len(), 1);
    assert_eq!(for_garlic.items[0].id, "visi-2");

    assert_eq!(
        repo.get_valid_ingredient_state_ingredient(&fx.ctx, "visi-1").unwrap(),
        created
    );
    repo.archive_valid_ingredient_state_ingredient(&fx.ctx, "visi-1").unwrap();
    let err = repo
        .get_valid_ingredient_state_ingredient(&fx.ctx, "visi-1")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(
        repo.list_valid_ingredient_state_ingredients(&fx.ctx, &QueryFilter::default())
            .unwrap()
            .total_count,
        1
    );
}

#[test]
fn preparation_instrument_links() {
    let fx = vocabulary();
    let preparations = SqliteValidPreparationRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    let repo = SqliteValidPreparationInstrumentRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();
    preparations.create_valid_preparation(&fx.ctx, &preparation("dice", "dice")).unwrap();

    let link = |id: &str, instrument: &str| ValidPreparationInstrumentCreationInput {
        id: id.to_string(),
        notes: String::new(),
        valid_preparation_id: "dice".to_string(),
        valid_instrument_id: instrument.to_string(),
    };
    let knife = repo
        .create_valid_preparation_instrument(&fx.ctx, &link("vpi-1", "inst-knife"))
        .unwrap();
    assert_eq!(knife.instrument.name, "knife");
    repo.create_valid_preparation_instrument(&fx.ctx, &link("vpi-2", "inst-board"))
        .unwrap();

    let for_dice = repo
        .list_valid_preparation_instruments_for_preparation(&fx.ctx, "dice", &QueryFilter::default())
        .unwrap();
    assert_eq!(for_dice.total_count, 2);
    let for_board = repo
        .list_valid_preparation_instruments_for_instrument(&fx.ctx, "inst-board", &QueryFilter::default())
        .unwrap();
    assert_eq!(for_board.items[0].id, "vpi-2");
    assert!(repo.valid_preparation_instrument_exists(&fx.ctx, "vpi-1").unwrap());

    let err = repo
        .create_valid_preparation_instrument(&fx.ctx, &link("vpi-3", "inst-missing"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn unit_conversions_list_by_direction_and_hydrate_optional_ingredient() {
    let fx = vocabulary();
    let repo = SqliteValidMeasurementUnitConversionRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let general = repo
        .create_valid_measurement_unit_conversion(&fx.ctx, &conversion("conv-1", "unit-cup", "unit-ml", None))
        .unwrap();
    assert_eq!(general.from.name, "cup");
    assert_eq!(general.to.name, "milliliter");
    assert!(general.only_for_ingredient.is_none());

    let onion_only = repo
        .create_valid_measurement_unit_conversion(
            &fx.ctx,
            &conversion("conv-2", "unit-cup", "unit-tbsp", Some("ing-onion")),
        )
        .unwrap();
    assert_eq!(
        onion_only.only_for_ingredient.as_ref().map(|i| i.name.as_str()),
        Some("onion")
    );

    let from_cup = repo
        .list_valid_measurement_unit_conversions_from_unit(&fx.ctx, "unit-cup")
        .unwrap();
    let ids: Vec<_> = from_cup.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["conv-1", "conv-2"]);
    let to_ml = repo
        .list_valid_measurement_unit_conversions_to_unit(&fx.ctx, "unit-ml")
        .unwrap();
    assert_eq!(to_ml, vec![general]);

    let cleared = repo
        .update_valid_measurement_unit_conversion(
            &fx.ctx,
            "conv-2",
            &ValidMeasurementUnitConversionUpdateInput {
                only_for_ingredient: Some(None),
                modifier: Some(16.0),
                ..Default::default()
            },
        )
        .unwrap();
    assert!(cleared.only_for_ingredient.is_none());
    assert_eq!(cleared.modifier, 16.0);

    repo.archive_valid_measurement_unit_conversion(&fx.ctx, "conv-2").unwrap();
    assert!(!repo
        .valid_measurement_unit_conversion_exists(&fx.ctx, "conv-2")
        .unwrap());
}

#[test]
fn unit_conversion_inputs_are_validated() {
    let fx = vocabulary();
    let repo = SqliteValidMeasurementUnitConversionRepository::try_new(&fx.conn, fx.runtime.clone()).unwrap();

    let mut zero = conversion("conv-1", "unit-cup", "unit-ml", None);
    zero.modifier = 0.0;
    for input in [conversion("conv-1", "unit-cup", "unit-cup", None), zero] {
        let err = repo
            .create_valid_measurement_unit_conversion(&fx.ctx, &input)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    repo.create_valid_measurement_unit_conversion(&fx.ctx, &conversion("conv-1", "unit-cup", "unit-ml", None))
        .unwrap();
    let err = repo
        .update_valid_measurement_unit_conversion(
            &fx.ctx,
            "conv-1",
            &ValidMeasurementUnitConversionUpdateInput {
                to_unit: Some("unit-cup".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    let err = repo
        .update_valid_measurement_unit_conversion(
            &fx.ctx,
            "conv-1",
            &ValidMeasurementUnitConversionUpdateInput {
                modifier: Some(f32::NAN),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}
