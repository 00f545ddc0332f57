use rayon::prelude::*;

pub fn par_iter_mut1<T1: Send + Sync, F: Fn(usize, &mut T1) + Send + Sync>(arr1: &mut [T1], f: F) {
    arr1.into_par_iter().enumerate().for_each(|(idx, v1)| {
        f(idx, v1);
    });
}

pub fn par_iter_mut2<T1: Send + Sync, T2: Send + Sync, F: Fn(usize, &mut T1, &mut T2) + Send + Sync>(
    arr1: &mut [T1],
    arr2: &mut [T2],
    f: F,
) {
    arr1.into_par_iter()
        .zip(arr2.into_par_iter())
        .enumerate()
        .for_each(|(idx, (v1, v2))| {
            f(idx, v1, v2);
        });
}
