use std::net::{Ipv4Addr, Ipv6Addr};

use proptest::prelude::*;

use dhcpconf::Position;
use dhcpconf::options::codec::{decode_fields, encode_csv};
use dhcpconf::options::{
    DHCP6_OPTION_SPACE, DefinitionCatalog, DefinitionSet, OptionDataSpec, OptionDataType,
    OptionDefinition, Universe, decode_option, resolve_option_code,
};

fn record_definition() -> OptionDefinition {
    OptionDefinition::new("triple", 1000, "isc", OptionDataType::Record).record(&[
        OptionDataType::Ipv4Address,
        OptionDataType::Uint16,
        OptionDataType::String,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2000))]

    #[test]
    fn decode_option_never_panics_on_arbitrary_data(
        data in ".{0,64}",
        code in prop::option::of(-10i64..70000),
        name in prop::option::of("[a-z-]{0,16}"),
        csv_format in prop::option::of(any::<bool>())
    ) {
        let runtime = DefinitionSet::default();
        let catalog = DefinitionCatalog::new(Universe::V6, &runtime);
        let spec = OptionDataSpec {
            code,
            name,
            data,
            csv_format,
            ..OptionDataSpec::default()
        };
        let _ = decode_option(&spec, Universe::V6, &catalog);
    }

    #[test]
    fn decode_fields_never_panics_on_arbitrary_payload(
        payload in prop::collection::vec(any::<u8>(), 0..128)
    ) {
        let _ = decode_fields(&record_definition(), &payload);
        let array = OptionDefinition::new("list", 1001, "isc", OptionDataType::Fqdn).array();
        let _ = decode_fields(&array, &payload);
    }

    #[test]
    fn record_fields_survive_encode_and_decode(
        address in any::<u32>(),
        port in any::<u16>(),
        label in "[a-zA-Z0-9_.-]{1,32}"
    ) {
        let definition = record_definition();
        let address = Ipv4Addr::from(address).to_string();
        let data = format!("{}, {}, {}", address, port, label);
        let payload = encode_csv(&definition, &data, Position::default()).unwrap();
        let fields = decode_fields(&definition, &payload).unwrap();
        prop_assert_eq!(fields, vec![address, port.to_string(), label]);
    }

    #[test]
    fn address_arrays_survive_encode_and_decode(
        addresses in prop::collection::vec(any::<u128>(), 1..8)
    ) {
        let definition = OptionDefinition::new(
            "dns-servers",
            23,
            DHCP6_OPTION_SPACE,
            OptionDataType::Ipv6Address,
        )
        .array();
        let addresses: Vec<String> = addresses
            .into_iter()
            .map(|bits| Ipv6Addr::from(bits).to_string())
            .collect();
        let payload = encode_csv(&definition, &addresses.join(","), Position::default()).unwrap();
        prop_assert_eq!(payload.len(), addresses.len() * 16);
        prop_assert_eq!(decode_fields(&definition, &payload).unwrap(), addresses);
    }

    #[test]
    fn numeric_tokens_resolve_to_themselves(code in 0u32..=65535) {
        let runtime = DefinitionSet::default();
        let catalog = DefinitionCatalog::new(Universe::V6, &runtime);
        let resolved = resolve_option_code(
            &code.to_string(),
            DHCP6_OPTION_SPACE,
            &catalog,
            Position::default(),
        );
        prop_assert_eq!(resolved, Ok(code as u16));
    }

    #[test]
    fn codes_above_range_are_rejected(code in 65536u64..u64::MAX) {
        let runtime = DefinitionSet::default();
        let catalog = DefinitionCatalog::new(Universe::V6, &runtime);
        let resolved = resolve_option_code(
            &code.to_string(),
            DHCP6_OPTION_SPACE,
            &catalog,
            Position::default(),
        );
        prop_assert!(resolved.is_err());
    }

    #[test]
    fn hex_data_is_taken_verbatim(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let runtime = DefinitionSet::default();
        let catalog = DefinitionCatalog::new(Universe::V6, &runtime);
        let spec = OptionDataSpec {
            code: Some(2000),
            data: hex::encode_upper(&bytes),
            ..OptionDataSpec::default()
        };
        let (descriptor, space) = decode_option(&spec, Universe::V6, &catalog).unwrap();
        prop_assert_eq!(space, DHCP6_OPTION_SPACE);
        prop_assert_eq!(descriptor.data, bytes);
    }
}
