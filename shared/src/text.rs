//! Number formatting for scripts

/// Format a float in the shortest form that reads back to the same value.
///
/// `1.0` is written `1`, `0.25` stays `0.25`, NaN is written `NaN`. Never
/// uses exponent notation.
pub fn float_to_string(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}

/// `(a, b, c)` with each component formatted by [`float_to_string`]
pub fn vector_to_string(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| float_to_string(*v)).collect();
    format!("({})", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_string() {
        assert_eq!(float_to_string(1.0), "1");
        assert_eq!(float_to_string(0.25), "0.25");
        assert_eq!(float_to_string(0.1), "0.1");
        assert_eq!(float_to_string(-2.5), "-2.5");
        assert_eq!(float_to_string(-1.0e9), "-1000000000");
        assert_eq!(float_to_string(-0.0), "0");
        assert_eq!(float_to_string(f32::NAN), "NaN");
    }

    #[test]
    fn test_float_to_string_reads_back_exactly() {
        for value in [0.26726124f32, 0.5345225, 0.8017837, 1.0 / 3.0, -1.0e-7, 123456.79, 1.0e-10] {
            let text = float_to_string(value);
            assert!(!text.contains('e'), "{text}");
            assert_eq!(text.parse::<f32>().unwrap(), value);
        }
    }

    #[test]
    fn test_vector_to_string() {
        assert_eq!(vector_to_string(&[1.0, 0.0, -0.5]), "(1, 0, -0.5)");
        assert_eq!(vector_to_string(&[2.0, 3.0]), "(2, 3)");
    }
}
