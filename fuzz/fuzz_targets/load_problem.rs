#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(problem) = bisim_net::Problem::from_json(s) {
            let places = problem.places();
            assert_eq!(problem.second().places(), places);
            for t in problem.table().transitions() {
                assert_eq!(t.before.places(), places);
                assert_eq!(t.after.places(), places);
            }
        }
    }
});
