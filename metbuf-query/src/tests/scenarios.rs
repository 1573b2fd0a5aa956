//! End-to-end scenarios: accumulate decoded subsets, materialize queries.

use metbuf_common::error::ErrorKind;
use metbuf_format::{TypeInfo, MISSING_VALUE};

use crate::data_object::encode_chars;
use crate::tests::mock::{
    binary_activation, delayed_activation, fixed_activation, query_set, TemplateBuilder,
};
use crate::{DataValues, QueryRunner, ResultSet};

const M: f64 = MISSING_VALUE;

#[test]
fn test_flat_leaf_across_three_subsets() {
    let mut template = TemplateBuilder::new("NC000001");
    let tmpk = template.number("TMPK", template.root());

    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK"])]));
    let mut results = ResultSet::new();
    for value in [1.0, 2.0, 3.0] {
        let provider = template.provider(vec![(tmpk, value)]);
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let object = results.get("temperature", None, None).unwrap();
    assert_eq!(object.dims(), &[3]);
    assert_eq!(object.values(), &DataValues::Double(vec![1.0, 2.0, 3.0]));
    assert_eq!(object.dim_paths(), &["*".to_string()]);
    assert_eq!(object.field_name(), "temperature");
}

#[test]
fn test_delayed_repeat_aligns_jagged_subsets() {
    let mut template = TemplateBuilder::new("NC000001");
    let (rep, body) = template.delayed("PLEVL", template.root());
    let pres = template.number("PRES", body);

    let mut runner = QueryRunner::new(query_set(&[("pressure", &["*/PLEVL/PRES"])]));
    let mut results = ResultSet::new();
    for values in [vec![10.0, 20.0], vec![30.0, 40.0, 50.0]] {
        let instantiations = values.iter().map(|&v| vec![(pres, v)]).collect();
        let provider = template.provider(delayed_activation(rep, body, instantiations));
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let object = results.get("pressure", None, None).unwrap();
    assert_eq!(object.dims(), &[2, 3]);
    assert_eq!(
        object.values(),
        &DataValues::Double(vec![10.0, 20.0, M, 30.0, 40.0, 50.0])
    );
    assert_eq!(
        object.dim_paths(),
        &["*".to_string(), "*/PLEVL".to_string()]
    );
}

#[test]
fn test_fixed_repeat_count_recovered_from_stream() {
    let mut template = TemplateBuilder::new("NC000001");
    let (rep, body) = template.fixed("TDWPR", template.root());
    let wspd = template.number("WSPD", body);

    let mut runner = QueryRunner::new(query_set(&[("wind_speed", &["*/TDWPR/WSPD"])]));
    let mut results = ResultSet::new();
    for _ in 0..2 {
        let stream = fixed_activation(rep, body, vec![vec![(wspd, 1.0)], vec![(wspd, 2.0)]]);
        let provider = template.provider(stream);
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let frame = &results.frames()[0];
    assert_eq!(frame.field_at(0).seq_counts, vec![vec![1], vec![2]]);

    let object = results.get("wind_speed", None, None).unwrap();
    assert_eq!(object.dims(), &[2, 2]);
    assert_eq!(
        object.values(),
        &DataValues::Double(vec![1.0, 2.0, 1.0, 2.0])
    );
}

#[test]
fn test_nested_replication_with_jaggedness() {
    let mut template = TemplateBuilder::new("NC000001");
    let (outer_rep, outer_body) = template.delayed("PLEVL", template.root());
    let (inner_rep, inner_body) = template.delayed("WIND", outer_body);
    let wspd = template.number("WSPD", inner_body);

    let mut runner = QueryRunner::new(query_set(&[("wind_speed", &["*/PLEVL/WIND/WSPD"])]));
    let mut results = ResultSet::new();

    let first = delayed_activation(inner_rep, inner_body, vec![vec![(wspd, 7.0)]]);
    let second =
        delayed_activation(inner_rep, inner_body, vec![vec![(wspd, 8.0)], vec![(wspd, 9.0)]]);
    let stream = delayed_activation(outer_rep, outer_body, vec![first, second]);
    let provider = template.provider(stream);
    runner.accumulate(&provider, &mut results).unwrap();

    // Occurrences implied by the nested counts match the harvest.
    let field = results.frames()[0].field_at(0);
    assert_eq!(field.seq_counts, vec![vec![1], vec![2], vec![1, 2]]);
    assert_eq!(field.data.len(), 3);

    let object = results.get("wind_speed", None, None).unwrap();
    assert_eq!(object.dims(), &[1, 2, 2]);
    assert_eq!(
        object.values(),
        &DataValues::Double(vec![7.0, M, 8.0, 9.0])
    );
}

#[test]
fn test_query_miss_yields_missing_rows() {
    let mut template = TemplateBuilder::new("NC000001");
    let tmpk = template.number("TMPK", template.root());

    let mut runner = QueryRunner::new(query_set(&[("nope", &["*/NOPE"])]));
    let mut results = ResultSet::new();
    for value in [1.0, 2.0] {
        let provider = template.provider(vec![(tmpk, value)]);
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let object = results.get("nope", None, None).unwrap();
    assert_eq!(object.dims(), &[2]);
    assert_eq!(object.dim_paths(), &["*".to_string()]);
    // The default type descriptor selects the unsigned 32-bit container,
    // where the sentinel saturates.
    assert_eq!(
        object.values(),
        &DataValues::UInt32(vec![u32::MAX, u32::MAX])
    );
}

#[test]
fn test_index_selector_picks_one_occurrence() {
    let mut template = TemplateBuilder::new("NC000001");
    let first = template.number("TMPK", template.root());
    let second = template.number("TMPK", template.root());
    let third = template.number("TMPK", template.root());
    let stream = vec![(first, 1.0), (second, 2.0), (third, 3.0)];

    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK[2]"])]));
    let mut results = ResultSet::new();
    runner
        .accumulate(&template.provider(stream.clone()), &mut results)
        .unwrap();

    let object = results.get("temperature", None, None).unwrap();
    assert_eq!(object.dims(), &[1]);
    assert_eq!(object.values(), &DataValues::Double(vec![2.0]));

    // Without an index the three occurrences are ambiguous.
    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK"])]));
    let mut results = ResultSet::new();
    let err = runner
        .accumulate(&template.provider(stream), &mut results)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::AmbiguousQuery { .. }));
}

#[test]
fn test_override_type_rejection_and_acceptance() {
    let mut template = TemplateBuilder::new("NC000001");
    let tmpk = template.number("TMPK", template.root());

    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK"])]));
    let mut results = ResultSet::new();
    runner
        .accumulate(&template.provider(vec![(tmpk, 270.6)]), &mut results)
        .unwrap();

    let err = results
        .get("temperature", None, Some("string"))
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::IncompatibleOverride { .. }));

    let err = results.get("temperature", None, Some("short")).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::UnknownOverrideType { .. }));

    let object = results.get("temperature", None, Some("int")).unwrap();
    assert_eq!(object.values(), &DataValues::Int32(vec![271]));
}

#[test]
fn test_alternative_queries_resolve_in_order() {
    let mut template = TemplateBuilder::new("NC000001");
    let prlc = template.number("PRLC", template.root());

    let set = query_set(&[("pressure", &["*/PRES", "*/PRLC"])]);
    let mut runner = QueryRunner::new(set);
    let mut results = ResultSet::new();
    runner
        .accumulate(&template.provider(vec![(prlc, 900.0)]), &mut results)
        .unwrap();

    let object = results.get("pressure", None, None).unwrap();
    assert_eq!(object.values(), &DataValues::Double(vec![900.0]));
    let target = &results.frames()[0].targets()[0];
    assert_eq!(target.query_str, "*/PRLC");
}

#[test]
fn test_subset_filter_restricts_queries() {
    let mut ships = TemplateBuilder::new("NC001001");
    let ship_tmpk = ships.number("TMPK", ships.root());
    let mut buoys = TemplateBuilder::new("NC001002");
    let buoy_tmpk = buoys.number("TMPK", buoys.root());

    let mut runner = QueryRunner::new(query_set(&[("temperature", &["NC001001/TMPK"])]));
    let mut results = ResultSet::new();
    runner
        .accumulate(&ships.provider(vec![(ship_tmpk, 280.0)]), &mut results)
        .unwrap();
    runner
        .accumulate(&buoys.provider(vec![(buoy_tmpk, 290.0)]), &mut results)
        .unwrap();

    let object = results.get("temperature", None, None).unwrap();
    assert_eq!(object.dims(), &[2]);
    assert_eq!(object.values(), &DataValues::Double(vec![280.0, M]));
}

#[test]
fn test_delayed_binary_collapses_and_is_not_exported() {
    let mut template = TemplateBuilder::new("NC000001");
    let (rep, body) = template.binary("QMARK", template.root());
    let qmrk = template.number("QMRK", body);

    let mut runner = QueryRunner::new(query_set(&[("quality", &["*/QMARK/QMRK"])]));
    let mut results = ResultSet::new();
    runner
        .accumulate(
            &template.provider(binary_activation(rep, body, Some(vec![(qmrk, 42.0)]))),
            &mut results,
        )
        .unwrap();
    runner
        .accumulate(
            &template.provider(binary_activation(rep, body, None)),
            &mut results,
        )
        .unwrap();

    assert_eq!(
        results.frames()[0].field_at(0).seq_counts,
        vec![vec![1], vec![1]]
    );
    assert_eq!(
        results.frames()[1].field_at(0).seq_counts,
        vec![vec![1], vec![0]]
    );

    let object = results.get("quality", None, None).unwrap();
    assert_eq!(object.dims(), &[2]);
    assert_eq!(object.values(), &DataValues::Double(vec![42.0, M]));
    assert_eq!(object.dim_paths(), &["*".to_string()]);
}

#[test]
fn test_zero_count_activation_leaves_missing_row() {
    let mut template = TemplateBuilder::new("NC000001");
    let (rep, body) = template.delayed("PLEVL", template.root());
    let pres = template.number("PRES", body);

    let mut runner = QueryRunner::new(query_set(&[("pressure", &["*/PLEVL/PRES"])]));
    let mut results = ResultSet::new();
    let full = delayed_activation(rep, body, vec![vec![(pres, 10.0)], vec![(pres, 20.0)]]);
    runner
        .accumulate(&template.provider(full), &mut results)
        .unwrap();
    let empty = delayed_activation(rep, body, Vec::new());
    runner
        .accumulate(&template.provider(empty), &mut results)
        .unwrap();

    assert_eq!(
        results.frames()[1].field_at(0).seq_counts,
        vec![vec![1], vec![0]]
    );

    let object = results.get("pressure", None, None).unwrap();
    assert_eq!(object.dims(), &[2, 2]);
    assert_eq!(
        object.values(),
        &DataValues::Double(vec![10.0, 20.0, M, M])
    );
}

#[test]
fn test_string_field_materializes_text() {
    let mut template = TemplateBuilder::new("NC000001");
    let stid = template.character("STID", template.root());

    let mut runner = QueryRunner::new(query_set(&[("station", &["*/STID"])]));
    let mut results = ResultSet::new();
    for text in ["KJFK", "EGLL"] {
        let provider = template.provider(vec![(stid, encode_chars(text))]);
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let object = results.get("station", None, None).unwrap();
    assert_eq!(
        object.values(),
        &DataValues::String(vec!["KJFK".to_string(), "EGLL".to_string()])
    );

    // The explicit override agrees; a numeric override does not.
    assert!(results.get("station", None, Some("string")).is_ok());
    let err = results.get("station", None, Some("int")).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::IncompatibleOverride { .. }));
}

#[test]
fn test_type_info_merges_across_subsets() {
    let narrow = TypeInfo {
        bits: 12,
        scale: 0,
        reference: -1024,
        unit: "K".to_string(),
        is_string: false,
    };
    let wide = TypeInfo {
        bits: 40,
        scale: 0,
        reference: 0,
        unit: "K".to_string(),
        is_string: false,
    };

    let mut ships = TemplateBuilder::new("NC001001");
    let ship_tmpk = ships.number_with("TMPK", ships.root(), narrow);
    let mut buoys = TemplateBuilder::new("NC001002");
    let buoy_tmpk = buoys.number_with("TMPK", buoys.root(), wide);

    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK"])]));
    let mut results = ResultSet::new();
    runner
        .accumulate(&ships.provider(vec![(ship_tmpk, 250.0)]), &mut results)
        .unwrap();
    runner
        .accumulate(&buoys.provider(vec![(buoy_tmpk, 260.0)]), &mut results)
        .unwrap();

    // Signed because of the narrow descriptor, 64-bit because of the wide.
    let object = results.get("temperature", None, None).unwrap();
    assert_eq!(object.values(), &DataValues::Int64(vec![250, 260]));
}

#[test]
fn test_group_by_prefix_validation() {
    let mut template = TemplateBuilder::new("NC000001");
    let (outer_rep, outer_body) = template.delayed("PLEVL", template.root());
    let pres = template.number("PRES", outer_body);
    let (inner_rep, inner_body) = template.delayed("WIND", outer_body);
    let wspd = template.number("WSPD", inner_body);

    let set = query_set(&[
        ("pressure", &["*/PLEVL/PRES"]),
        ("wind_speed", &["*/PLEVL/WIND/WSPD"]),
    ]);
    let mut runner = QueryRunner::new(set);
    let mut results = ResultSet::new();

    let mut instantiation = vec![(pres, 900.0)];
    instantiation.extend(delayed_activation(inner_rep, inner_body, vec![vec![(wspd, 5.0)]]));
    let stream = delayed_activation(outer_rep, outer_body, vec![instantiation]);
    runner
        .accumulate(&template.provider(stream), &mut results)
        .unwrap();

    let object = results
        .get("wind_speed", Some("pressure"), None)
        .unwrap();
    assert_eq!(object.group_by_field_name(), "pressure");
    assert_eq!(object.values(), &DataValues::Double(vec![5.0]));
}

#[test]
fn test_group_by_path_mismatch_is_rejected() {
    let mut template = TemplateBuilder::new("NC000001");
    let (pres_rep, pres_body) = template.delayed("PLEVL", template.root());
    let pres = template.number("PRES", pres_body);
    let (wind_rep, wind_body) = template.delayed("WIND", template.root());
    let wspd = template.number("WSPD", wind_body);

    let set = query_set(&[
        ("pressure", &["*/PLEVL/PRES"]),
        ("wind_speed", &["*/WIND/WSPD"]),
    ]);
    let mut runner = QueryRunner::new(set);
    let mut results = ResultSet::new();
    let mut stream = delayed_activation(pres_rep, pres_body, vec![vec![(pres, 900.0)]]);
    stream.extend(delayed_activation(wind_rep, wind_body, vec![vec![(wspd, 5.0)]]));
    runner
        .accumulate(&template.provider(stream), &mut results)
        .unwrap();

    let err = results
        .get("wind_speed", Some("pressure"), None)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::GroupByPathMismatch { .. }));

    let err = results.get("wind_speed", Some("nope"), None).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}

#[test]
fn test_get_before_accumulate_is_no_data() {
    let results = ResultSet::new();
    let err = results.get("anything", None, None).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NoData));
}

#[test]
fn test_unknown_field_name_is_rejected() {
    let mut template = TemplateBuilder::new("NC000001");
    let tmpk = template.number("TMPK", template.root());
    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK"])]));
    let mut results = ResultSet::new();
    runner
        .accumulate(&template.provider(vec![(tmpk, 1.0)]), &mut results)
        .unwrap();

    let err = results.get("humidity", None, None).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
}

#[test]
fn test_get_is_idempotent() {
    let mut template = TemplateBuilder::new("NC000001");
    let (rep, body) = template.delayed("PLEVL", template.root());
    let pres = template.number("PRES", body);

    let mut runner = QueryRunner::new(query_set(&[("pressure", &["*/PLEVL/PRES"])]));
    let mut results = ResultSet::new();
    for values in [vec![1.0], vec![2.0, 3.0]] {
        let instantiations = values.iter().map(|&v| vec![(pres, v)]).collect();
        let provider = template.provider(delayed_activation(rep, body, instantiations));
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let first = results.get("pressure", None, None).unwrap();
    let second = results.get("pressure", None, None).unwrap();
    assert_eq!(first.values(), second.values());
    assert_eq!(first.dims(), second.dims());
    assert_eq!(first.dim_paths(), second.dim_paths());
}

#[test]
fn test_resolution_is_cached_per_subset_name() {
    let mut template = TemplateBuilder::new("NC000001");
    let tmpk = template.number("TMPK", template.root());

    let mut runner = QueryRunner::new(query_set(&[("temperature", &["*/TMPK"])]));
    let mut results = ResultSet::new();

    let first = template.provider(vec![(tmpk, 1.0)]);
    runner.accumulate(&first, &mut results).unwrap();
    assert!(first.tag_reads.get() > 0);

    // Tags are only read while building the subset table; a cached subset
    // name must not trigger another build.
    let second = template.provider(vec![(tmpk, 2.0)]);
    runner.accumulate(&second, &mut results).unwrap();
    assert_eq!(second.tag_reads.get(), 0);

    let object = results.get("temperature", None, None).unwrap();
    assert_eq!(object.values(), &DataValues::Double(vec![1.0, 2.0]));
}

#[test]
fn test_stacked_delayed_repeat_behaves_like_delayed() {
    let mut template = TemplateBuilder::new("NC000001");
    let (rep, body) = template.delayed_stacked("RAWRP", template.root());
    let rrstg = template.number("RRSTG", body);

    let mut runner = QueryRunner::new(query_set(&[("raw", &["*/RAWRP/RRSTG"])]));
    let mut results = ResultSet::new();
    for values in [vec![1.0, 2.0, 3.0], vec![4.0]] {
        let instantiations = values.iter().map(|&v| vec![(rrstg, v)]).collect();
        let provider = template.provider(delayed_activation(rep, body, instantiations));
        runner.accumulate(&provider, &mut results).unwrap();
    }

    let object = results.get("raw", None, None).unwrap();
    assert_eq!(object.dims(), &[2, 3]);
    assert_eq!(
        object.values(),
        &DataValues::Double(vec![1.0, 2.0, 3.0, 4.0, M, M])
    );
}

#[test]
fn test_leaf_between_replication_groups() {
    let mut template = TemplateBuilder::new("NC000001");
    let clat = template.number("CLAT", template.root());
    let (rep, body) = template.delayed("PLEVL", template.root());
    let pres = template.number("PRES", body);
    let clon = template.number("CLON", template.root());

    let set = query_set(&[
        ("latitude", &["*/CLAT"]),
        ("pressure", &["*/PLEVL/PRES"]),
        ("longitude", &["*/CLON"]),
    ]);
    let mut runner = QueryRunner::new(set);
    let mut results = ResultSet::new();

    let mut stream = vec![(clat, 45.5)];
    stream.extend(delayed_activation(rep, body, vec![vec![(pres, 900.0)], vec![(pres, 850.0)]]));
    stream.push((clon, -105.2));
    runner
        .accumulate(&template.provider(stream), &mut results)
        .unwrap();

    assert_eq!(
        results.get("latitude", None, None).unwrap().values(),
        &DataValues::Double(vec![45.5])
    );
    assert_eq!(
        results.get("pressure", None, None).unwrap().values(),
        &DataValues::Double(vec![900.0, 850.0])
    );
    assert_eq!(
        results.get("longitude", None, None).unwrap().values(),
        &DataValues::Double(vec![-105.2])
    );
}
