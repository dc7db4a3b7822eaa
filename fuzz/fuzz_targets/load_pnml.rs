#![no_main]
use libfuzzer_sys::fuzz_target;

// Net and resources table separated by the first NUL byte.
fuzz_target!(|data: &[u8]| {
    let Some(split) = data.iter().position(|&b| b == 0) else {
        return;
    };
    let Ok(net) = std::str::from_utf8(&data[..split]) else {
        return;
    };
    if let Ok(problem) = bisim_net::Problem::from_pnml(net, &data[split + 1..]) {
        let places = problem.places();
        assert_eq!(problem.second().places(), places);
        for t in problem.table().transitions() {
            assert_eq!(t.before.places(), places);
            assert_eq!(t.after.places(), places);
        }
    }
});
