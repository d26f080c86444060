// Layer configuration files.

use std::fs;

use rust_neural_layers::config::{build_layer, load_config, parse_config};
use rust_neural_layers::prelude::*;
use tempfile::NamedTempFile;

fn config_path(name: &str) -> String {
    format!("{}/config/{}", env!("CARGO_MANIFEST_DIR"), name)
}

// ============================================================================
// Loading
// ============================================================================

mod loading_tests {
    use super::*;

    #[test]
    fn test_load_bundled_configs() {
        let dense = load_config(&config_path("dense_tanh.json")).unwrap();
        assert_eq!(dense.layer_type, "dense");
        assert_eq!(dense.name(), "hidden");
        assert_eq!(dense.activation, Some(Activation::Tanh));

        let affine = load_config(&config_path("scale_shift.json")).unwrap();
        assert_eq!(affine.size, Some(8));
    }

    #[test]
    fn test_load_from_temp_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(
            file.path(),
            r#"{"layer_type": "dense", "inputs": 2, "outputs": 5, "activation": "relu"}"#,
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.outputs, Some(5));
        assert_eq!(config.name(), "dense");
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("config/does_not_exist.json").unwrap_err();
        assert!(matches!(err, LayerError::Io(_)));
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_config(r#"{"layer_type": "dense", "inputs": }"#).unwrap_err();
        assert!(matches!(err, LayerError::Json(_)));
    }

    #[test]
    fn test_scale_shift_rejects_activation() {
        let err =
            parse_config(r#"{"layer_type": "scale_shift", "size": 2, "activation": "tanh"}"#)
                .unwrap_err();
        assert!(matches!(err, LayerError::InvalidConfig(_)));
    }
}

// ============================================================================
// Building
// ============================================================================

mod build_tests {
    use super::*;

    #[test]
    fn test_build_bundled_dense() {
        let config = load_config(&config_path("dense_tanh.json")).unwrap();
        let layer = build_layer(&config).unwrap();

        assert_eq!(layer.class_id(), "dense");
        assert_eq!((layer.inputs(), layer.outputs()), (4, 3));
        assert_eq!(layer.parameter_count(), 15);
        layer.validate().unwrap();

        let limit = DenseLayer::xavier_limit(4, 3);
        for buffer in layer.parameter_buffers() {
            assert!(buffer.iter().all(|v| v.abs() <= limit));
        }
    }

    #[test]
    fn test_build_is_seeded() {
        let config = load_config(&config_path("dense_tanh.json")).unwrap();
        let a = build_layer(&config).unwrap();
        let b = build_layer(&config).unwrap();
        assert!(a.equal(b.as_ref()));

        let mut reseeded = config.clone();
        reseeded.seed = Some(43);
        assert!(!build_layer(&reseeded).unwrap().equal(a.as_ref()));
    }

    #[test]
    fn test_build_scale_shift_defaults_to_identity() {
        let config = load_config(&config_path("scale_shift.json")).unwrap();
        let layer = build_layer(&config).unwrap();

        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(layer.apply_vec(&input), input);
    }

    #[test]
    fn test_build_scale_shift_with_init_limit() {
        let config =
            parse_config(r#"{"layer_type": "scale_shift", "size": 4, "init_limit": 0.1}"#)
                .unwrap();
        let layer = build_layer(&config).unwrap();

        for buffer in layer.parameter_buffers() {
            assert!(buffer.iter().all(|v| v.abs() <= 0.1));
        }
    }

    #[test]
    fn test_built_layer_round_trips() {
        let config = load_config(&config_path("dense_tanh.json")).unwrap();
        let layer = build_layer(&config).unwrap();

        let mut store = StoreWriter::new();
        layer.poly_serialize(&mut store);
        let bytes = store.into_bytes();
        let restored = LayerRegistry::with_builtin_layers()
            .unwrap()
            .poly_reconstitute(&mut StoreReader::new(&bytes))
            .unwrap();
        assert!(restored.equal(layer.as_ref()));
    }
}
