//! Property-based tests for column classification and decimals.

use pl_common::{ColumnType, Decimal};
use proptest::prelude::*;

fn wrapper() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Nullable"),
        Just("nullable"),
        Just("LowCardinality"),
        Just("LOWCARDINALITY"),
    ]
}

fn base_type() -> impl Strategy<Value = (&'static str, ColumnType)> {
    prop_oneof![
        Just(("String", ColumnType::String)),
        Just(("Decimal(18, 4)", ColumnType::Decimal)),
        Just(("Decimal64(2)", ColumnType::Decimal)),
        Just(("Array(String)", ColumnType::ArrayOfString)),
        Just(("Array(Nullable(String))", ColumnType::ArrayOfString)),
        Just(("Array(UInt8)", ColumnType::ArrayOfOther)),
        Just(("DateTime64(3)", ColumnType::Other)),
        Just(("UInt64", ColumnType::Other)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn wrappers_never_change_the_category(
        (base, expected) in base_type(),
        wrappers in prop::collection::vec(wrapper(), 0..3),
        pad in " {0,2}",
    ) {
        let mut ty = base.to_string();
        for w in &wrappers {
            ty = format!("{}({}{}{})", w, pad, ty, pad);
        }
        prop_assert_eq!(ColumnType::classify(&format!("{}{}", pad, ty)), expected);
    }

    #[test]
    fn decimal_text_is_stable(int in 0u64..10_000_000, frac in "[0-9]{0,6}", negative in any::<bool>()) {
        let text = if frac.is_empty() {
            format!("{}{}", if negative { "-" } else { "" }, int)
        } else {
            format!("{}{}.{}", if negative { "-" } else { "" }, int, frac)
        };
        let first = Decimal::parse(&text).unwrap().to_string();
        let second = Decimal::parse(&first).unwrap().to_string();
        prop_assert_eq!(&first, &second);
        prop_assert!(!first.contains(['e', 'E']));
    }
}
