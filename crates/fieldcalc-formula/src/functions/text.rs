//! Text functions

/// UPPERCASE(values...): upper-cased and joined
pub fn fn_uppercase(args: &[String]) -> String {
    args.iter().map(|s| s.to_uppercase()).collect()
}

/// LOWERCASE(values...): lower-cased and joined
pub fn fn_lowercase(args: &[String]) -> String {
    args.iter().map(|s| s.to_lowercase()).collect()
}

/// CONCATENATE(values...), also the `&` operator
pub fn fn_concatenate(args: &[String]) -> String {
    args.concat()
}
