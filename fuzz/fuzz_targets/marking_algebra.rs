#![no_main]
use bisim_net::{Marking, Transition};
use libfuzzer_sys::fuzz_target;

const PLACES: usize = 3;

fn marking(bytes: &[u8]) -> Marking {
    Marking::new(bytes.iter().map(|&b| u64::from(b % 16)).collect())
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 6 * PLACES {
        return;
    }
    let mut chunks = data.chunks_exact(PLACES);
    let mut next = || marking(chunks.next().unwrap_or(&[0; PLACES]));
    let (init, prev) = (next(), next());
    let delta = Transition::new("d", "a", next(), next());
    let gamma = Transition::new("g", "a", next(), next());

    let (inter, left, right) = Marking::split_intersection(&init, &prev);
    assert!(inter.subset_of(&init) && inter.subset_of(&prev));
    assert_eq!(inter.power() + left.power(), init.power());
    assert_eq!(inter.power() + right.power(), prev.power());

    let weak = Marking::weak_transition(&init, &delta);
    assert!(delta.after.subset_of(&weak));

    let mut answer = Marking::zeros(PLACES);
    if Marking::mirror_transition(&init, &prev, &delta, &gamma, &mut answer) {
        assert!(gamma.after.subset_of(&answer));
        assert_eq!(answer.power(), answer.counts().iter().sum::<u64>());
    }
});
