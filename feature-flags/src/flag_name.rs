/// Strips the provider namespace from a raw flag name.
///
/// Providers report flags as `namespace.name`, only the part after the first `.` is used
/// locally: `featureManagement.demoFlag1` becomes `demoFlag1` and `a.b.c` becomes `b.c`.
/// Names without a separator are kept as they are.
pub fn local_name(raw_name: &str) -> &str {
    match raw_name.split_once('.') {
        Some((_, name)) => name,
        None => raw_name,
    }
}
